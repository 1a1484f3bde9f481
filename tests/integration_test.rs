//! Integration tests for feedgroups.
//!
//! Drives import and export end to end through the store, the catalog and
//! both persistence gateways.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use feedgroups::io::formats::decode;
use feedgroups::io::{ExportService, ImportService, SourceCreator};
use feedgroups::models::{SourceRequest, check_invariants};
use feedgroups::storage::{FilesystemGateway, MemoryGateway};
use feedgroups::{
    Error, GroupStore, PersistenceGateway, SourceCatalog, SourceGroup, SourceId, Transition,
};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Harness {
    store: Arc<GroupStore>,
    catalog: Arc<SourceCatalog>,
}

impl Harness {
    fn open(gateway: Arc<dyn PersistenceGateway>) -> Self {
        let store = Arc::new(GroupStore::open(Arc::clone(&gateway)).unwrap());
        let catalog = Arc::new(SourceCatalog::open(gateway).unwrap());
        store.reconcile(&catalog.table().unwrap()).unwrap();
        Self { store, catalog }
    }

    async fn flush(&self) {
        self.store.flush().await;
        self.catalog.flush().await;
    }

    fn in_memory() -> Self {
        Self::open(Arc::new(MemoryGateway::new()))
    }

    fn importer(&self) -> ImportService<SourceCatalog> {
        ImportService::new(Arc::clone(&self.store), Arc::clone(&self.catalog))
    }

    fn exporter(&self) -> ExportService {
        ExportService::new(Arc::clone(&self.store), Arc::clone(&self.catalog))
    }

    fn assert_consistent(&self) {
        check_invariants(&self.store.snapshot().unwrap(), &self.catalog.table().unwrap()).unwrap();
    }
}

const SUBSCRIPTIONS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<opml version="1.0">
  <head><title>Subscriptions</title></head>
  <body>
    <outline type="rss" text="Solo" xmlUrl="https://solo.example.com/feed"/>
    <outline text="Tech">
      <outline type="rss" text="Alpha" xmlUrl="https://alpha.example.com/rss"/>
      <outline type="rss" text="Beta" xmlUrl="https://beta.example.com/atom.xml"/>
    </outline>
    <outline text="News">
      <outline type="rss" text="Gamma" xmlUrl="https://gamma.example.com/feed"/>
    </outline>
  </body>
</opml>"#;

#[tokio::test]
async fn test_import_builds_groups_and_sources() {
    let harness = Harness::in_memory();

    let report = harness.importer().import_document(SUBSCRIPTIONS).await.unwrap();

    assert_eq!(report.total, 4);
    assert_eq!(report.imported.len(), 4);
    assert_eq!(report.groups_created, 2);
    assert!(!report.has_failures());
    harness.assert_consistent();

    let snapshot = harness.store.snapshot().unwrap();
    let names: Vec<&str> = snapshot
        .iter()
        .filter(|g| g.is_multiple)
        .map(SourceGroup::display_name)
        .collect();
    assert_eq!(names, vec!["Tech", "News"]);
    assert_eq!(snapshot.iter().filter(|g| !g.is_multiple).count(), 1);
}

#[tokio::test]
async fn test_import_partial_failure_reports_each_failure_once() {
    let harness = Harness::in_memory();
    harness
        .catalog
        .add(&SourceRequest::new("https://dup.example.com/feed"))
        .unwrap();
    harness
        .store
        .dispatch(Transition::SourceAdded { sid: SourceId::new(0) })
        .unwrap();

    let document = r#"<opml><body>
        <outline type="rss" text="A" xmlUrl="https://a.example.com/feed"/>
        <outline type="rss" text="Broken" xmlUrl="not-a-url"/>
        <outline text="Group">
            <outline text="B" xmlUrl="https://b.example.com/feed"/>
            <outline text="Dup" xmlUrl="https://dup.example.com/feed"/>
            <outline text="C" xmlUrl="https://c.example.com/feed"/>
        </outline>
    </body></opml>"#;

    let report = harness.importer().import_document(document).await.unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(report.imported.len(), 3);
    let failed: BTreeSet<&str> = report.failures.iter().map(|f| f.url.as_str()).collect();
    assert_eq!(
        failed,
        BTreeSet::from(["not-a-url", "https://dup.example.com/feed"])
    );
    assert!(report.summary().contains("2 failed"));
    assert_eq!(harness.catalog.list().unwrap().len(), 4);
    harness.assert_consistent();
}

#[derive(Default)]
struct CountingCreator {
    calls: AtomicUsize,
}

impl SourceCreator for CountingCreator {
    fn create(
        &self,
        _request: SourceRequest,
    ) -> impl Future<Output = feedgroups::Result<SourceId>> + Send {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(SourceId::new(u32::try_from(call).unwrap()))
        }
    }
}

#[tokio::test]
async fn test_malformed_document_has_no_side_effects() {
    let store = Arc::new(GroupStore::new(Arc::new(MemoryGateway::new()), Vec::new()));
    let creator = Arc::new(CountingCreator::default());
    let service = ImportService::new(Arc::clone(&store), Arc::clone(&creator));

    let err = service
        .import_document(r#"<opml><body><outline text="Tech"><outline xmlUrl="https://a.example.com/f"/></body></opml>"#)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StructuralParse(_)));
    assert_eq!(creator.calls.load(Ordering::SeqCst), 0);
    assert!(store.transition_log().unwrap().is_empty());
    assert!(store.snapshot().unwrap().is_empty());
}

#[tokio::test]
async fn test_export_then_decode_preserves_associations() {
    let harness = Harness::in_memory();
    harness.importer().import_document(SUBSCRIPTIONS).await.unwrap();

    let document = harness.exporter().export_document().unwrap();
    let decoded = decode(&document).unwrap();

    let sources = harness.catalog.table().unwrap();
    let mut expected = BTreeSet::new();
    for group in harness.store.snapshot().unwrap().iter() {
        for sid in &group.sids {
            let url = sources[sid].url.clone();
            let group_name = group.is_multiple.then(|| group.display_name().to_string());
            expected.insert((url, group_name));
        }
    }
    let actual: BTreeSet<(String, Option<String>)> = decoded
        .descriptors
        .iter()
        .map(|d| (d.url.clone(), decoded.group_name(d).map(ToString::to_string)))
        .collect();

    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_reorder_then_export_follows_new_order() {
    let harness = Harness::in_memory();
    harness.importer().import_document(SUBSCRIPTIONS).await.unwrap();

    // [Tech, News, Solo]
    let before = harness.store.snapshot().unwrap();
    assert_eq!(before.len(), 3);
    harness
        .store
        .dispatch(Transition::ReorderGroups {
            order: vec![1, 2, 0],
        })
        .unwrap();

    let decoded = decode(&harness.exporter().export_document().unwrap()).unwrap();
    let group_names: Vec<&str> = decoded.groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(group_names, vec!["News", "Tech"]);
    let urls: Vec<&str> = decoded.descriptors.iter().map(|d| d.url.as_str()).collect();
    assert_eq!(urls[0], "https://gamma.example.com/feed");
    assert_eq!(urls[1], "https://solo.example.com/feed");
    assert_eq!(
        urls[2..].iter().copied().collect::<BTreeSet<_>>(),
        BTreeSet::from(["https://alpha.example.com/rss", "https://beta.example.com/atom.xml"])
    );
}

#[tokio::test]
async fn test_state_survives_reopen_through_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let gateway: Arc<dyn PersistenceGateway> =
        Arc::new(FilesystemGateway::with_create(dir.path()).unwrap());

    let first = Harness::open(Arc::clone(&gateway));
    first.importer().import_document(SUBSCRIPTIONS).await.unwrap();
    first.flush().await;
    let expected = first.store.snapshot().unwrap();

    let reopened = Harness::open(gateway);
    assert_eq!(reopened.store.snapshot().unwrap(), expected);
    assert_eq!(reopened.catalog.list().unwrap().len(), 4);
    reopened.assert_consistent();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_import_persists_consistent_state() {
    let dir = tempfile::tempdir().unwrap();
    let gateway: Arc<dyn PersistenceGateway> =
        Arc::new(FilesystemGateway::with_create(dir.path()).unwrap());

    let first = Harness::open(Arc::clone(&gateway));
    let report = first.importer().import_document(SUBSCRIPTIONS).await.unwrap();
    assert_eq!(report.imported.len(), 4);
    first.flush().await;

    assert_eq!(gateway.load_sources().unwrap(), first.catalog.table().unwrap());
    assert_eq!(gateway.load_groups().unwrap(), *first.store.snapshot().unwrap());
    check_invariants(&gateway.load_groups().unwrap(), &gateway.load_sources().unwrap()).unwrap();
}

#[tokio::test]
async fn test_reopen_repairs_groups_out_of_step_with_sources() {
    let dir = tempfile::tempdir().unwrap();
    let gateway: Arc<dyn PersistenceGateway> =
        Arc::new(FilesystemGateway::with_create(dir.path()).unwrap());

    let first = Harness::open(Arc::clone(&gateway));
    first.importer().import_document(SUBSCRIPTIONS).await.unwrap();
    first.flush().await;

    // Groups saved, source table lost one entry and gained another.
    let mut sources = gateway.load_sources().unwrap();
    let dropped = *sources.keys().next().unwrap();
    sources.remove(&dropped);
    let extra = SourceId::new(99);
    sources.insert(
        extra,
        feedgroups::Source::new(extra, "https://extra.example.com/feed", "Extra"),
    );
    gateway.save_sources(&sources).unwrap();

    let reopened = Harness::open(Arc::clone(&gateway));
    reopened.assert_consistent();
    let snapshot = reopened.store.snapshot().unwrap();
    assert!(snapshot.iter().all(|g| !g.contains(dropped)));
    assert_eq!(snapshot.last().unwrap().sids, vec![extra]);

    reopened.flush().await;
    check_invariants(&gateway.load_groups().unwrap(), &gateway.load_sources().unwrap()).unwrap();
}

#[tokio::test]
async fn test_export_to_file_and_reimport_elsewhere() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.opml");

    let source = Harness::in_memory();
    source.importer().import_document(SUBSCRIPTIONS).await.unwrap();
    let result = source.exporter().export_to_file(&path).unwrap();
    assert_eq!(result.sources, 4);

    let target = Harness::in_memory();
    let report = target.importer().import_from_file(&path).await.unwrap();
    assert_eq!(report.imported.len(), 4);
    assert_eq!(report.groups_created, 2);
    target.assert_consistent();
}

#[test]
fn test_delete_group_rematerializes_members() {
    let store = GroupStore::new(Arc::new(MemoryGateway::new()), Vec::new());
    store
        .dispatch(Transition::SourceAdded { sid: SourceId::new(1) })
        .unwrap();
    let group = store.create_group("Bundle").unwrap();
    for id in [3, 7, 9] {
        store
            .dispatch(Transition::SourceAdded { sid: SourceId::new(id) })
            .unwrap();
        store
            .dispatch(Transition::AddSourceToGroup {
                group_index: group,
                sid: SourceId::new(id),
            })
            .unwrap();
    }
    // [single(1), Bundle{3,7,9}]
    let snapshot = store
        .dispatch(Transition::DeleteGroup { group_index: 1 })
        .unwrap();

    let layout: Vec<(bool, Vec<u32>)> = snapshot
        .iter()
        .map(|g| (g.is_multiple, g.sids.iter().map(|s| s.get()).collect()))
        .collect();
    assert_eq!(
        layout,
        vec![
            (false, vec![1]),
            (false, vec![3]),
            (false, vec![7]),
            (false, vec![9]),
        ]
    );
}
