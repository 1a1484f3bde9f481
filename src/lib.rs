//! # Feedgroups
//!
//! Feed subscription groups with bulk OPML import and export.
//!
//! Feedgroups keeps an ordered collection of source groups, applies every
//! change through a closed set of named transitions, and synchronizes the
//! whole structure with outline (OPML) documents.
//!
//! ## Features
//!
//! - Invariant-preserving group store with immutable snapshots
//! - Replayable transition log published on an event bus
//! - Concurrent fan-out import with a single aggregated failure report
//! - Order-preserving OPML export
//! - Pluggable persistence gateways (filesystem, in-memory)
//!
//! ## Example
//!
//! ```rust,ignore
//! use feedgroups::io::ImportService;
//! use feedgroups::services::{GroupStore, SourceCatalog};
//!
//! let store = Arc::new(GroupStore::open(gateway.clone())?);
//! let catalog = Arc::new(SourceCatalog::open(gateway)?);
//! let service = ImportService::new(store, catalog);
//! let report = service.import_from_file(Path::new("subscriptions.opml")).await?;
//! if report.has_failures() {
//!     eprintln!("{}", report.summary());
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::FeedGroupsConfig;
pub use models::{GroupSnapshot, Source, SourceGroup, SourceId, SourceTable, Transition};
pub use services::{GroupStore, SourceCatalog};
pub use storage::PersistenceGateway;

/// Error type for feedgroups operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `StructuralParse` | An outline document is not a well-formed tree |
/// | `SourceCreation` | A single source could not be created (bad URL, duplicate) |
/// | `Persistence` | Loading or saving groups or sources failed |
/// | `InvariantViolation` | A transition's preconditions are not met |
/// | `InvalidInput` | Malformed CLI arguments or configuration values |
/// | `OperationFailed` | I/O errors, export write failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The outline document could not be parsed as a well-formed tree.
    ///
    /// Terminal for a whole import; raised before any side effects.
    #[error("document is not well-formed: {0}")]
    StructuralParse(String),

    /// Creating one source failed.
    ///
    /// Carries the original endpoint so batch reports can name it.
    #[error("failed to add source '{url}': {cause}")]
    SourceCreation {
        /// The endpoint as it appeared in the request.
        url: String,
        /// The underlying cause.
        cause: String,
    },

    /// A persistence gateway operation failed.
    ///
    /// Never rolls back in-memory state.
    #[error("persistence '{operation}' failed: {cause}")]
    Persistence {
        /// The gateway operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A transition was dispatched whose preconditions do not hold.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for feedgroups operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
