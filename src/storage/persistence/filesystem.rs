//! Filesystem persistence gateway.
//!
//! Stores the group collection and the source table as pretty-printed JSON
//! documents under a data directory:
//!
//! ```text
//! <data_dir>/
//!   groups.json
//!   sources.json
//! ```
//!
//! Writes go to a sibling temp file first and are renamed into place, so a
//! crash mid-save leaves the previous document intact.

use crate::models::{Source, SourceGroup, SourceTable};
use crate::storage::traits::PersistenceGateway;
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum size accepted when reading a stored document (16MB).
const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

const GROUPS_FILE: &str = "groups.json";
const SOURCES_FILE: &str = "sources.json";

/// JSON-file persistence gateway.
pub struct FilesystemGateway {
    /// Base directory for storage.
    base_path: PathBuf,
}

impl FilesystemGateway {
    /// Creates a gateway rooted at `base_path`.
    ///
    /// The directory is created lazily on first save.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Creates a gateway and makes sure its directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_create(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).map_err(|e| Error::Persistence {
            operation: "create_data_dir".to_string(),
            cause: format!("{}: {e}", base_path.display()),
        })?;
        Ok(Self { base_path })
    }

    /// Returns the base path.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn read_document<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T> {
        let path = self.base_path.join(file);
        if !path.exists() {
            return Ok(T::default());
        }

        let metadata = fs::metadata(&path).map_err(|e| Error::Persistence {
            operation: "read_file_metadata".to_string(),
            cause: e.to_string(),
        })?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(Error::Persistence {
                operation: "read_document".to_string(),
                cause: format!(
                    "{} exceeds maximum size of {MAX_FILE_SIZE} bytes",
                    path.display()
                ),
            });
        }

        let json = fs::read_to_string(&path).map_err(|e| Error::Persistence {
            operation: "read_document".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        serde_json::from_str(&json).map_err(|e| Error::Persistence {
            operation: "deserialize_document".to_string(),
            cause: format!("{}: {e}", path.display()),
        })
    }

    fn write_document<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.base_path).map_err(|e| Error::Persistence {
            operation: "create_data_dir".to_string(),
            cause: e.to_string(),
        })?;

        let json = serde_json::to_string_pretty(value).map_err(|e| Error::Persistence {
            operation: "serialize_document".to_string(),
            cause: e.to_string(),
        })?;

        let path = self.base_path.join(file);
        let tmp = self.base_path.join(format!(".{file}.tmp"));
        fs::write(&tmp, json).map_err(|e| Error::Persistence {
            operation: "write_document".to_string(),
            cause: format!("{}: {e}", tmp.display()),
        })?;
        fs::rename(&tmp, &path).map_err(|e| Error::Persistence {
            operation: "rename_document".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;

        tracing::debug!(path = %path.display(), "Saved document");
        Ok(())
    }
}

impl PersistenceGateway for FilesystemGateway {
    fn load_groups(&self) -> Result<Vec<SourceGroup>> {
        self.read_document(GROUPS_FILE)
    }

    fn save_groups(&self, groups: &[SourceGroup]) -> Result<()> {
        self.write_document(GROUPS_FILE, groups)
    }

    fn load_sources(&self) -> Result<SourceTable> {
        // Stored as a list so the JSON stays readable and keys stay numeric.
        let sources: Vec<Source> = self.read_document(SOURCES_FILE)?;
        Ok(sources.into_iter().map(|s| (s.sid, s)).collect())
    }

    fn save_sources(&self, sources: &SourceTable) -> Result<()> {
        let list: Vec<&Source> = sources.values().collect();
        self.write_document(SOURCES_FILE, &list)
    }
}
