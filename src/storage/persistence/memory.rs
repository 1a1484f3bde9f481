//! In-memory persistence gateway.
//!
//! Keeps saved state in process memory. Used by tests and by callers that
//! do not need durability; saves can be made to fail on demand.

use crate::models::{SourceGroup, SourceTable};
use crate::storage::traits::PersistenceGateway;
use crate::{Error, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory persistence gateway.
#[derive(Default)]
pub struct MemoryGateway {
    groups: Mutex<Vec<SourceGroup>>,
    sources: Mutex<SourceTable>,
    fail_saves: AtomicBool,
    group_saves: AtomicUsize,
}

impl MemoryGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway pre-seeded with state.
    #[must_use]
    pub fn with_state(groups: Vec<SourceGroup>, sources: SourceTable) -> Self {
        Self {
            groups: Mutex::new(groups),
            sources: Mutex::new(sources),
            ..Self::default()
        }
    }

    /// Makes every subsequent save fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Returns how many group saves have succeeded.
    #[must_use]
    pub fn group_saves(&self) -> usize {
        self.group_saves.load(Ordering::SeqCst)
    }

    fn check_writable(&self, operation: &str) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Persistence {
                operation: operation.to_string(),
                cause: "store is read-only".to_string(),
            });
        }
        Ok(())
    }
}

fn lock_error(operation: &str, e: impl std::fmt::Display) -> Error {
    Error::Persistence {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

impl PersistenceGateway for MemoryGateway {
    fn load_groups(&self) -> Result<Vec<SourceGroup>> {
        let groups = self
            .groups
            .lock()
            .map_err(|e| lock_error("load_groups", e))?;
        Ok(groups.clone())
    }

    fn save_groups(&self, groups: &[SourceGroup]) -> Result<()> {
        self.check_writable("save_groups")?;
        let mut stored = self
            .groups
            .lock()
            .map_err(|e| lock_error("save_groups", e))?;
        *stored = groups.to_vec();
        self.group_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_sources(&self) -> Result<SourceTable> {
        let sources = self
            .sources
            .lock()
            .map_err(|e| lock_error("load_sources", e))?;
        Ok(sources.clone())
    }

    fn save_sources(&self, sources: &SourceTable) -> Result<()> {
        self.check_writable("save_sources")?;
        let mut stored = self
            .sources
            .lock()
            .map_err(|e| lock_error("save_sources", e))?;
        stored.clone_from(sources);
        Ok(())
    }
}
