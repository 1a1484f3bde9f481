//! Collaborator traits for import operations.
//!
//! [`SourceCreator`] is the narrow contract through which an import creates
//! sources; [`FetchObserver`] is how the item-fetch pipeline follows a batch.

use crate::Result;
use crate::io::services::import::{ImportProgress, ImportReport};
use crate::models::{SourceId, SourceRequest};
use std::future::Future;

/// Creates a source and assigns its identity.
///
/// Each call is independent: an import launches one call per descriptor and
/// never waits for one call before starting another. Timeouts, if any, are
/// the implementation's concern.
///
/// # Example Implementation
///
/// ```rust,ignore
/// impl SourceCreator for RemoteCreator {
///     fn create(&self, request: SourceRequest) -> impl Future<Output = Result<SourceId>> + Send {
///         async move {
///             let feed = self.client.fetch(&request.url).await.map_err(|e| Error::SourceCreation {
///                 url: request.url.clone(),
///                 cause: e.to_string(),
///             })?;
///             self.register(feed)
///         }
///     }
/// }
/// ```
pub trait SourceCreator: Send + Sync + 'static {
    /// Creates the source described by `request`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SourceCreation`] carrying the request's
    /// endpoint and the cause.
    fn create(&self, request: SourceRequest) -> impl Future<Output = Result<SourceId>> + Send;
}

/// Observer notified as an import batch progresses.
///
/// Purely observational; every method defaults to a no-op.
pub trait FetchObserver: Send + Sync {
    /// A batch of `pending` sources is about to be created.
    fn batch_started(&self, _pending: usize) {}

    /// One source settled (success or failure).
    fn item_settled(&self, _progress: &ImportProgress) {}

    /// Every source in the batch has settled.
    fn batch_completed(&self, _report: &ImportReport) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FetchObserver for NoopObserver {}
