//! Outline import/export subsystem.
//!
//! Moves the group collection in and out of OPML documents.
//!
//! - [`formats`] holds the codec (document to descriptors and back)
//! - [`services`] orchestrate the codec against the group store
//! - [`traits`] are the collaborator seams: source creation and the
//!   item-fetch observer
//!
//! # Examples
//!
//! ```rust,ignore
//! use feedgroups::io::{ImportService, ExportService};
//!
//! let report = ImportService::new(store.clone(), catalog.clone())
//!     .import_from_file(Path::new("feeds.opml"))
//!     .await?;
//! println!("{}", report.summary());
//!
//! let result = ExportService::new(store, catalog).export_to_file(Path::new("out.opml"))?;
//! println!("Exported {} sources", result.sources);
//! ```

pub mod formats;
pub mod services;
pub mod traits;

pub use formats::{DecodedGroup, DecodedOutline, OutlineDescriptor};
pub use services::{
    DEFAULT_EXPORT_TITLE, ExportResult, ExportService, ImportFailure, ImportProgress,
    ImportReport, ImportService,
};
pub use traits::{FetchObserver, NoopObserver, SourceCreator};
