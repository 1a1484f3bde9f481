//! Outline export service.
//!
//! Serializes the current group snapshot against the source table. Export
//! only reads state; a failed write leaves everything as it was.

use crate::io::formats::opml;
use crate::services::{GroupStore, SourceCatalog};
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// Title written into exported documents unless configured otherwise.
pub const DEFAULT_EXPORT_TITLE: &str = "Feedgroups Export";

/// Result of an export operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// Groups in the exported snapshot.
    pub groups: usize,
    /// Sources written.
    pub sources: usize,
    /// Output path (if file export).
    pub output_path: Option<String>,
}

/// Service for exporting the group collection as an outline document.
pub struct ExportService {
    store: Arc<GroupStore>,
    catalog: Arc<SourceCatalog>,
    title: String,
}

impl ExportService {
    /// Creates a new export service.
    #[must_use]
    pub fn new(store: Arc<GroupStore>, catalog: Arc<SourceCatalog>) -> Self {
        Self {
            store,
            catalog,
            title: DEFAULT_EXPORT_TITLE.to_string(),
        }
    }

    /// Sets the document title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Renders the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if state cannot be read or the document cannot be
    /// written.
    pub fn export_document(&self) -> Result<String> {
        self.render().map(|(document, _)| document)
    }

    /// Renders the current snapshot and writes it to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be written.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn export_to_file(&self, path: &Path) -> Result<ExportResult> {
        let (document, mut result) = self.render()?;
        std::fs::write(path, document).map_err(|e| Error::OperationFailed {
            operation: "write_export_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        result.output_path = Some(path.display().to_string());
        tracing::info!(groups = result.groups, sources = result.sources, "Exported groups");
        Ok(result)
    }

    fn render(&self) -> Result<(String, ExportResult)> {
        let snapshot = self.store.snapshot()?;
        let sources = self.catalog.table()?;
        let document = opml::encode(&snapshot, &sources, &self.title)?;
        let written = snapshot
            .iter()
            .flat_map(|group| &group.sids)
            .filter(|sid| sources.contains_key(sid))
            .count();
        Ok((
            document,
            ExportResult {
                groups: snapshot.len(),
                sources: written,
                output_path: None,
            },
        ))
    }
}
