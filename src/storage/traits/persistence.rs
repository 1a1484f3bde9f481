//! Persistence gateway trait.

use crate::Result;
use crate::models::{SourceGroup, SourceTable};

/// Durable storage for the group collection and the source table.
///
/// The gateway is the authoritative copy only across restarts; while the
/// process runs, in-memory state wins and saves are best-effort catch-up.
/// Implementations must be thread-safe (`Send + Sync`) because saves run on
/// the blocking pool.
pub trait PersistenceGateway: Send + Sync {
    /// Loads the persisted group collection.
    ///
    /// Returns an empty collection when nothing has been saved yet.
    fn load_groups(&self) -> Result<Vec<SourceGroup>>;

    /// Replaces the persisted group collection.
    fn save_groups(&self, groups: &[SourceGroup]) -> Result<()>;

    /// Loads the persisted source table.
    ///
    /// Returns an empty table when nothing has been saved yet.
    fn load_sources(&self) -> Result<SourceTable>;

    /// Replaces the persisted source table.
    fn save_sources(&self, sources: &SourceTable) -> Result<()>;
}
