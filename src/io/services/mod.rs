//! Import and export orchestration.

pub mod export;
pub mod import;

pub use export::{DEFAULT_EXPORT_TITLE, ExportResult, ExportService};
pub use import::{ImportFailure, ImportProgress, ImportReport, ImportService};
