//! Source catalog service.
//!
//! File-backed implementation of the source-creation contract. The catalog
//! owns the source table; groups only reference its identities.
//!
//! # Creation rules
//!
//! | Check | Failure cause |
//! |-------|---------------|
//! | Endpoint looks like an `http(s)` URL with a host | `invalid url` |
//! | No existing source has the same endpoint | `source already exists` |
//!
//! New identities are one past the highest identity in the table. A missing
//! display name falls back to the endpoint's host.

use super::save_queue::SaveQueue;
use crate::io::SourceCreator;
use crate::models::{Source, SourceId, SourceRequest, SourceTable};
use crate::storage::PersistenceGateway;
use crate::{Error, Result};
use regex::Regex;
use std::future::Future;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use url::Url;

// Prefix match; characters after a valid address are not checked.
static FEED_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(www\.)?[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_\+.~#?&/=]*)",
    )
    .ok()
});

/// Returns `true` if `url` looks like a subscribable endpoint.
#[must_use]
pub fn is_feed_url(url: &str) -> bool {
    FEED_URL.as_ref().is_some_and(|re| re.is_match(url))
}

/// Returns the host of an endpoint, without a leading `www.`.
///
/// Returns `None` if `url` does not parse or has no host.
#[must_use]
pub fn endpoint_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

struct CatalogState {
    table: SourceTable,
    revision: u64,
}

/// Owns the source table and creates sources.
///
/// Every change bumps a revision under the table lock and hands a copy of
/// the table to an ordered save queue, so concurrent creations never leave
/// an older table on disk.
pub struct SourceCatalog {
    state: Mutex<CatalogState>,
    gateway: Arc<dyn PersistenceGateway>,
    saves: SaveQueue,
}

impl SourceCatalog {
    /// Creates a catalog over an explicit table.
    #[must_use]
    pub fn new(gateway: Arc<dyn PersistenceGateway>, sources: SourceTable) -> Self {
        Self {
            state: Mutex::new(CatalogState {
                table: sources,
                revision: 0,
            }),
            gateway,
            saves: SaveQueue::default(),
        }
    }

    /// Creates a catalog from the gateway's persisted table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if loading fails.
    pub fn open(gateway: Arc<dyn PersistenceGateway>) -> Result<Self> {
        let sources = gateway.load_sources()?;
        tracing::debug!(sources = sources.len(), "Loaded source table");
        Ok(Self::new(gateway, sources))
    }

    /// Returns a copy of the source table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table lock is poisoned.
    pub fn table(&self) -> Result<SourceTable> {
        Ok(self.lock_state()?.table.clone())
    }

    /// Returns one source.
    ///
    /// # Errors
    ///
    /// Returns an error if the table lock is poisoned.
    pub fn get(&self, sid: SourceId) -> Result<Option<Source>> {
        Ok(self.lock_state()?.table.get(&sid).cloned())
    }

    /// Returns all sources in identity order.
    ///
    /// # Errors
    ///
    /// Returns an error if the table lock is poisoned.
    pub fn list(&self) -> Result<Vec<Source>> {
        Ok(self.lock_state()?.table.values().cloned().collect())
    }

    /// Validates and registers a new source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SourceCreation`] if the endpoint is invalid or
    /// already subscribed.
    pub fn add(&self, request: &SourceRequest) -> Result<Source> {
        let url = request.url.trim();
        if !is_feed_url(url) {
            return Err(Error::SourceCreation {
                url: request.url.clone(),
                cause: "invalid url".to_string(),
            });
        }

        let (source, revision, table) = {
            let mut state = self.lock_state()?;
            if state.table.values().any(|s| s.url == url) {
                return Err(Error::SourceCreation {
                    url: request.url.clone(),
                    cause: "source already exists".to_string(),
                });
            }
            let sid = state
                .table
                .keys()
                .next_back()
                .map_or(SourceId::new(0), |last| last.next());
            let name = request
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(ToString::to_string)
                .or_else(|| endpoint_host(url))
                .unwrap_or_else(|| url.to_string());
            let mut source = Source::new(sid, url, name);
            if let Some(target) = request.open_target {
                source = source.with_open_target(target);
            }
            if let Some(icon_url) = &request.icon_url {
                source = source.with_icon_url(icon_url.clone());
            }
            state.table.insert(sid, source.clone());
            let (revision, table) = state.commit();
            (source, revision, table)
        };

        if !request.silent {
            tracing::info!(sid = %source.sid, url = %source.url, "Added source");
        }
        self.persist(revision, table);
        Ok(source)
    }

    /// Renames a source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the source does not exist.
    pub fn rename(&self, sid: SourceId, name: impl Into<String>) -> Result<Source> {
        let (source, revision, table) = {
            let mut state = self.lock_state()?;
            let source = state
                .table
                .get_mut(&sid)
                .ok_or_else(|| Error::InvalidInput(format!("unknown source {sid}")))?;
            source.name = name.into();
            let source = source.clone();
            let (revision, table) = state.commit();
            (source, revision, table)
        };
        self.persist(revision, table);
        Ok(source)
    }

    /// Removes a source from the table.
    ///
    /// The caller is responsible for dispatching the matching
    /// `SourceDeleted` transition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the source does not exist.
    pub fn delete(&self, sid: SourceId) -> Result<Source> {
        let (source, revision, table) = {
            let mut state = self.lock_state()?;
            let source = state
                .table
                .remove(&sid)
                .ok_or_else(|| Error::InvalidInput(format!("unknown source {sid}")))?;
            let (revision, table) = state.commit();
            (source, revision, table)
        };
        tracing::info!(sid = %sid, "Deleted source");
        self.persist(revision, table);
        Ok(source)
    }

    /// Waits for every scheduled save of the table to finish.
    pub async fn flush(&self) {
        self.saves.flush().await;
    }

    fn persist(&self, revision: u64, table: SourceTable) {
        let gateway = Arc::clone(&self.gateway);
        self.saves.schedule(revision, move || {
            if let Err(e) = gateway.save_sources(&table) {
                metrics::counter!("persistence_save_failed_total").increment(1);
                tracing::warn!(revision, error = %e, "Failed to save source table");
            }
        });
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, CatalogState>> {
        self.state.lock().map_err(|e| Error::OperationFailed {
            operation: "lock_source_table".to_string(),
            cause: e.to_string(),
        })
    }
}

impl CatalogState {
    fn commit(&mut self) -> (u64, SourceTable) {
        self.revision += 1;
        (self.revision, self.table.clone())
    }
}

impl SourceCreator for SourceCatalog {
    fn create(&self, request: SourceRequest) -> impl Future<Output = Result<SourceId>> + Send {
        async move { self.add(&request).map(|source| source.sid) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceOpenTarget;
    use crate::storage::MemoryGateway;
    use test_case::test_case;

    fn catalog() -> (SourceCatalog, Arc<MemoryGateway>) {
        let gateway = Arc::new(MemoryGateway::new());
        (SourceCatalog::new(gateway.clone(), SourceTable::new()), gateway)
    }

    #[test_case("https://a.example.com/feed", true ; "https with path")]
    #[test_case("http://www.example.org/rss.xml?x=1", true ; "http with query")]
    #[test_case("ftp://a.example.com/feed", false ; "wrong scheme")]
    #[test_case("https://localhost", false ; "no tld")]
    #[test_case("not a url", false ; "plain text")]
    #[test_case("https://example.com/feed?tags=a,b", true ; "comma in query")]
    #[test_case("https://example.com/rss;jsessionid=1", true ; "path parameter")]
    #[test_case("https://example.com/news!/feed*", true ; "bang and star")]
    #[test_case("https://example.com/o'reilly.xml", true ; "apostrophe")]
    fn test_is_feed_url(url: &str, expected: bool) {
        assert_eq!(is_feed_url(url), expected);
    }

    #[test_case("https://www.example.org/rss", Some("example.org"))]
    #[test_case("https://blog.a.example.com?feed=1", Some("blog.a.example.com"))]
    #[test_case("https://user@example.com:8080/feed", Some("example.com") ; "userinfo and port")]
    #[test_case("a.example.com/feed", None ; "no scheme")]
    fn test_endpoint_host(url: &str, host: Option<&str>) {
        assert_eq!(endpoint_host(url).as_deref(), host);
    }

    #[test]
    fn test_add_assigns_increasing_ids_and_persists() {
        let (catalog, gateway) = catalog();
        let first = catalog
            .add(&SourceRequest::new("https://a.example.com/feed").with_name("A"))
            .unwrap();
        let second = catalog.add(&SourceRequest::new(" https://b.example.com/feed ")).unwrap();

        assert_eq!(first.sid, SourceId::new(0));
        assert_eq!(second.sid, SourceId::new(1));
        assert_eq!(second.url, "https://b.example.com/feed");
        assert_eq!(second.name, "b.example.com");
        assert_eq!(gateway.load_sources().unwrap().len(), 2);
    }

    #[test]
    fn test_add_rejects_duplicates_and_bad_urls() {
        let (catalog, _) = catalog();
        catalog.add(&SourceRequest::new("https://a.example.com/feed")).unwrap();

        let err = catalog
            .add(&SourceRequest::new("https://a.example.com/feed"))
            .unwrap_err();
        assert!(
            matches!(err, Error::SourceCreation { ref cause, .. } if cause == "source already exists")
        );

        let err = catalog.add(&SourceRequest::new("nonsense")).unwrap_err();
        assert!(matches!(err, Error::SourceCreation { ref url, .. } if url == "nonsense"));
    }

    #[test]
    fn test_delete_frees_endpoint() {
        let (catalog, _) = catalog();
        let source = catalog.add(&SourceRequest::new("https://a.example.com/feed")).unwrap();
        catalog.delete(source.sid).unwrap();

        assert!(catalog.get(source.sid).unwrap().is_none());
        assert!(catalog.add(&SourceRequest::new("https://a.example.com/feed")).is_ok());
        assert!(catalog.delete(SourceId::new(42)).is_err());
    }

    #[test]
    fn test_rename() {
        let (catalog, _) = catalog();
        let source = catalog.add(&SourceRequest::new("https://a.example.com/feed")).unwrap();
        let renamed = catalog.rename(source.sid, "Alpha").unwrap();
        assert_eq!(renamed.name, "Alpha");
        assert_eq!(catalog.list().unwrap()[0].name, "Alpha");
    }

    #[test]
    fn test_add_applies_request_preferences() {
        let (catalog, gateway) = catalog();
        let source = catalog
            .add(
                &SourceRequest::new("https://a.example.com/feed")
                    .with_open_target(SourceOpenTarget::External)
                    .with_icon_url("https://a.example.com/favicon.ico"),
            )
            .unwrap();

        assert_eq!(source.open_target, SourceOpenTarget::External);
        assert_eq!(source.icon_url.as_deref(), Some("https://a.example.com/favicon.ico"));
        assert_eq!(gateway.load_sources().unwrap()[&source.sid], source);
    }

    /// Delays saves of one-entry tables so they finish after newer ones.
    #[derive(Default)]
    struct SlowSmallSaves {
        inner: MemoryGateway,
    }

    impl PersistenceGateway for SlowSmallSaves {
        fn load_groups(&self) -> Result<Vec<crate::models::SourceGroup>> {
            self.inner.load_groups()
        }

        fn save_groups(&self, groups: &[crate::models::SourceGroup]) -> Result<()> {
            self.inner.save_groups(groups)
        }

        fn load_sources(&self) -> Result<SourceTable> {
            self.inner.load_sources()
        }

        fn save_sources(&self, sources: &SourceTable) -> Result<()> {
            if sources.len() == 1 {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            self.inner.save_sources(sources)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_persist_newest_table() {
        let gateway = Arc::new(SlowSmallSaves::default());
        let catalog = Arc::new(SourceCatalog::new(gateway.clone(), SourceTable::new()));

        let tasks: Vec<_> = ["https://a.example.com/feed", "https://b.example.com/feed"]
            .into_iter()
            .map(|url| {
                let catalog = Arc::clone(&catalog);
                tokio::spawn(async move { catalog.create(SourceRequest::new(url).silent()).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        catalog.flush().await;

        assert_eq!(gateway.load_sources().unwrap(), catalog.table().unwrap());
        assert_eq!(gateway.load_sources().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_resolves_to_sid() {
        let (catalog, _) = catalog();
        let sid = catalog
            .create(SourceRequest::new("https://a.example.com/feed").silent())
            .await
            .unwrap();
        assert_eq!(sid, SourceId::new(0));
    }
}
