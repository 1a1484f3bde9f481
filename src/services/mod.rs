//! Business logic services.
//!
//! The [`GroupStore`] owns group state and applies transitions through the
//! pure [`reducer`]; the [`SourceCatalog`] owns the source table. The batch
//! coordinator drives concurrent source creation during imports.

mod batch;
mod catalog;
mod group_store;
pub mod reducer;
mod save_queue;

pub use batch::{Batch, BatchProgress, Settlement};
pub use catalog::{SourceCatalog, endpoint_host, is_feed_url};
pub use group_store::GroupStore;
