//! Command handlers module.
//!
//! - `io.rs`: outline import and export
//! - `groups.rs`: group listing and editing
//! - `sources.rs`: source table management

mod groups;
mod io;
mod sources;

use std::sync::Arc;

use feedgroups::config::FeedGroupsConfig;
use feedgroups::storage::FilesystemGateway;
use feedgroups::{GroupStore, PersistenceGateway, Result, SourceCatalog};

pub use groups::{GroupsAction, cmd_groups};
pub use io::{cmd_export, cmd_import};
pub use sources::{SourcesAction, cmd_sources};

/// Services shared by every command.
pub struct App {
    /// Loaded configuration.
    pub config: FeedGroupsConfig,
    /// Group state.
    pub store: Arc<GroupStore>,
    /// Source table.
    pub catalog: Arc<SourceCatalog>,
}

impl App {
    /// Opens the data directory named by `config`.
    ///
    /// A missing data directory is created and starts empty. Stored groups
    /// are reconciled with the stored source table before any command runs.
    pub fn open(config: FeedGroupsConfig) -> Result<Self> {
        let gateway: Arc<dyn PersistenceGateway> =
            Arc::new(FilesystemGateway::with_create(config.data_dir.clone())?);
        let store = Arc::new(GroupStore::open(Arc::clone(&gateway))?);
        let catalog = Arc::new(SourceCatalog::open(gateway)?);
        let repaired = store.reconcile(&catalog.table()?)?;
        if repaired > 0 {
            tracing::warn!(repaired, "Repaired stored groups against the source table");
        }
        Ok(Self {
            config,
            store,
            catalog,
        })
    }
}
