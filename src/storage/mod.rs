//! Storage layer abstraction.
//!
//! The group store and the source catalog only talk to a
//! [`PersistenceGateway`]; implementations live under [`persistence`]:
//! - **Filesystem**: JSON documents in the data directory
//! - **Memory**: process-local state for tests

pub mod persistence;
pub mod traits;

pub use persistence::{FilesystemGateway, MemoryGateway};
pub use traits::PersistenceGateway;
