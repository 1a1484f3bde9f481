//! Outline import service.
//!
//! Turns an outline document into groups and sources. Groups are created
//! first, then every source-creation call is launched at once; each result
//! is folded into the store as it settles. One failing source never stops
//! or rolls back the others.

use crate::io::formats::opml;
use crate::io::traits::{FetchObserver, NoopObserver, SourceCreator};
use crate::models::{SourceId, SourceRequest, Transition};
use crate::services::{Batch, BatchProgress, GroupStore, Settlement};
use crate::{Error, Result};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// Running counts while an import batch settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportProgress {
    /// Sources settled so far.
    pub settled: usize,
    /// Sources in the batch.
    pub total: usize,
    /// Sources created so far.
    pub imported: usize,
    /// Sources that failed so far.
    pub failed: usize,
}

impl ImportProgress {
    /// Returns the percentage complete (0-100).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_complete(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            (self.settled as f32 / self.total as f32) * 100.0
        }
    }
}

/// A source that could not be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    /// Endpoint exactly as written in the document.
    pub url: String,
    /// Why creation failed.
    pub cause: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Sources in the document.
    pub total: usize,
    /// Identities of the sources created, in settlement order.
    pub imported: Vec<SourceId>,
    /// Sources that could not be created.
    pub failures: Vec<ImportFailure>,
    /// Groups created from containers in the document.
    pub groups_created: usize,
}

impl ImportReport {
    /// Returns whether any source failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// One summary for the whole batch, listing every failure.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Imported {} of {} sources into {} new groups",
            self.imported.len(),
            self.total,
            self.groups_created
        );
        if self.has_failures() {
            let _ = write!(summary, "; {} failed:", self.failures.len());
            for failure in &self.failures {
                let _ = write!(summary, "\n  {}: {}", failure.url, failure.cause);
            }
        }
        summary
    }
}

struct PendingSource {
    request: SourceRequest,
    target: Option<usize>,
    original_url: String,
}

/// Service for importing outline documents.
pub struct ImportService<C: SourceCreator> {
    store: Arc<GroupStore>,
    creator: Arc<C>,
    observer: Arc<dyn FetchObserver>,
}

impl<C: SourceCreator> ImportService<C> {
    /// Creates an import service with no observer.
    #[must_use]
    pub fn new(store: Arc<GroupStore>, creator: Arc<C>) -> Self {
        Self {
            store,
            creator,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Sets the observer notified as the batch progresses.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Imports an outline file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not well-formed.
    pub async fn import_from_file(&self, path: &Path) -> Result<ImportReport> {
        let document =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| Error::OperationFailed {
                    operation: "read_import_file".to_string(),
                    cause: format!("{}: {e}", path.display()),
                })?;
        self.import_document(&document).await
    }

    /// Imports an outline document.
    ///
    /// Per-source failures are collected in the report, never returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StructuralParse`] if the document is not well-formed;
    /// nothing is created in that case.
    #[instrument(skip(self, document), fields(bytes = document.len()))]
    pub async fn import_document(&self, document: &str) -> Result<ImportReport> {
        let decoded = opml::decode(document)?;

        let mut group_indices = Vec::with_capacity(decoded.groups.len());
        for group in &decoded.groups {
            group_indices.push(self.store.create_group(group.name.clone())?);
        }

        let pending: Vec<PendingSource> = decoded
            .descriptors
            .into_iter()
            .map(|descriptor| {
                let mut request = SourceRequest::new(descriptor.url).silent();
                if let Some(name) = descriptor.name {
                    request = request.with_name(name);
                }
                PendingSource {
                    request,
                    target: descriptor
                        .group
                        .and_then(|g| group_indices.get(g).copied()),
                    original_url: descriptor.original_url,
                }
            })
            .collect();

        let mut report = ImportReport {
            total: pending.len(),
            groups_created: group_indices.len(),
            ..ImportReport::default()
        };
        tracing::info!(
            sources = report.total,
            groups = report.groups_created,
            "Starting import batch"
        );
        self.observer.batch_started(report.total);

        let mut batch = Batch::new();
        let mut targets = Vec::with_capacity(pending.len());
        for (index, source) in pending.into_iter().enumerate() {
            targets.push(source.target);
            let creator = Arc::clone(&self.creator);
            let request = source.request;
            batch.launch(source.original_url, async move {
                (index, creator.create(request).await)
            });
        }

        batch
            .settle(|settlement, progress| {
                self.record_settlement(settlement, &targets, &mut report);
                self.notify_progress(progress, &report);
            })
            .await;

        tracing::info!(
            imported = report.imported.len(),
            failed = report.failures.len(),
            "Import batch completed"
        );
        if report.has_failures() {
            tracing::warn!(summary = %report.summary(), "Some sources could not be imported");
        }
        self.observer.batch_completed(&report);
        Ok(report)
    }

    fn record_settlement(
        &self,
        settlement: &Settlement<(usize, Result<SourceId>)>,
        targets: &[Option<usize>],
        report: &mut ImportReport,
    ) {
        let url = settlement.label.clone();
        let outcome = match &settlement.outcome {
            Some((index, Ok(sid))) => self
                .place_source(*sid, targets.get(*index).copied().flatten())
                .map(|()| *sid),
            Some((_, Err(e))) => Err(e.to_string()),
            None => Err("source creation did not complete".to_string()),
        };

        match outcome {
            Ok(sid) => {
                metrics::counter!("import_items_settled_total", "outcome" => "imported")
                    .increment(1);
                report.imported.push(sid);
            },
            Err(cause) => {
                metrics::counter!("import_items_settled_total", "outcome" => "failed").increment(1);
                tracing::debug!(url = %url, cause = %cause, "Source import failed");
                report.failures.push(ImportFailure { url, cause });
            },
        }
    }

    fn place_source(&self, sid: SourceId, target: Option<usize>) -> std::result::Result<(), String> {
        self.store
            .dispatch(Transition::SourceAdded { sid })
            .map_err(|e| e.to_string())?;
        if let Some(group_index) = target {
            // The source already exists ungrouped; a failed move is logged only.
            if let Err(e) = self
                .store
                .dispatch(Transition::AddSourceToGroup { group_index, sid })
            {
                tracing::error!(sid = %sid, group_index, error = %e, "Failed to place imported source");
            }
        }
        Ok(())
    }

    fn notify_progress(&self, progress: BatchProgress, report: &ImportReport) {
        self.observer.item_settled(&ImportProgress {
            settled: progress.settled,
            total: progress.total,
            imported: report.imported.len(),
            failed: report.failures.len(),
        });
    }
}
