//! Group store service.
//!
//! Owns the canonical group collection. Every change goes through
//! [`GroupStore::dispatch`], which:
//!
//! 1. runs the pure [`reducer`](super::reducer) against the current snapshot,
//! 2. swaps in the new snapshot and appends a [`TransitionRecord`] to the log
//!    (both under one lock, so no transition is observed half-applied),
//! 3. publishes a [`StoreEvent`] on the store's [`EventBus`],
//! 4. schedules a best-effort save through the [`PersistenceGateway`].
//!
//! Saves never roll back memory state and are not retried. They go through
//! a [`SaveQueue`], which keeps them in transition order.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = GroupStore::open(Arc::new(FilesystemGateway::new(data_dir)))?;
//! let tech = store.create_group("Tech")?;
//! store.dispatch(Transition::AddSourceToGroup { group_index: tech, sid })?;
//! store.flush().await;
//! ```

use super::reducer;
use super::save_queue::SaveQueue;
use crate::models::{
    EventMeta, GroupSnapshot, SourceGroup, SourceId, SourceTable, StoreEvent, Transition,
    TransitionRecord, check_invariants, position_of,
};
use crate::observability::EventBus;
use crate::storage::PersistenceGateway;
use crate::{Error, Result, current_timestamp};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

const EVENT_SOURCE: &str = "group_store";

struct StoreState {
    initial: GroupSnapshot,
    snapshot: GroupSnapshot,
    log: Vec<TransitionRecord>,
}

/// State container and invariant-preserving reducer for source groups.
pub struct GroupStore {
    state: Mutex<StoreState>,
    gateway: Arc<dyn PersistenceGateway>,
    events: EventBus,
    saves: SaveQueue,
}

impl GroupStore {
    /// Creates a store over an explicit initial collection.
    #[must_use]
    pub fn new(gateway: Arc<dyn PersistenceGateway>, initial: Vec<SourceGroup>) -> Self {
        let initial = Arc::new(initial);
        Self {
            state: Mutex::new(StoreState {
                initial: Arc::clone(&initial),
                snapshot: initial,
                log: Vec::new(),
            }),
            gateway,
            events: EventBus::default(),
            saves: SaveQueue::default(),
        }
    }

    /// Creates a store from the gateway's persisted collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Persistence`] if loading fails, or
    /// [`Error::InvariantViolation`] if a stored group is malformed.
    pub fn open(gateway: Arc<dyn PersistenceGateway>) -> Result<Self> {
        let groups = gateway.load_groups()?;
        for (index, group) in groups.iter().enumerate() {
            group
                .validate()
                .map_err(|e| Error::InvariantViolation(format!("stored group {index}: {e}")))?;
        }
        tracing::debug!(groups = groups.len(), "Loaded group collection");
        Ok(Self::new(gateway, groups))
    }

    /// Returns the event bus transitions are published on.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns the current snapshot.
    ///
    /// The snapshot is never mutated; later transitions publish new ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn snapshot(&self) -> Result<GroupSnapshot> {
        Ok(Arc::clone(&self.lock_state()?.snapshot))
    }

    /// Returns the collection the log starts from.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn initial_snapshot(&self) -> Result<GroupSnapshot> {
        Ok(Arc::clone(&self.lock_state()?.initial))
    }

    /// Returns a copy of the transition log.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn transition_log(&self) -> Result<Vec<TransitionRecord>> {
        Ok(self.lock_state()?.log.clone())
    }

    /// Applies a transition and returns the resulting snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`] if the transition's
    /// preconditions do not hold; state and log are left unchanged.
    pub fn dispatch(&self, transition: Transition) -> Result<GroupSnapshot> {
        let name = transition.name();
        let outcome = {
            let mut state = self.lock_state()?;
            reducer::apply(&state.snapshot, &transition).map(|next| {
                let record = TransitionRecord {
                    seq: state.log.len() as u64 + 1,
                    timestamp: current_timestamp(),
                    transition,
                };
                let snapshot = Arc::new(next);
                state.snapshot = Arc::clone(&snapshot);
                state.log.push(record.clone());
                (record, snapshot)
            })
        };

        let (record, snapshot) = match outcome {
            Ok(applied) => applied,
            Err(e) => {
                metrics::counter!("transitions_rejected_total", "transition" => name).increment(1);
                tracing::error!(transition = name, error = %e, "Rejected transition");
                self.events.publish(StoreEvent::TransitionRejected {
                    meta: EventMeta::new(EVENT_SOURCE),
                    transition: name,
                    reason: e.to_string(),
                });
                return Err(e);
            },
        };

        metrics::counter!("transitions_applied_total", "transition" => name).increment(1);
        tracing::debug!(
            seq = record.seq,
            transition = name,
            groups = snapshot.len(),
            "Applied transition"
        );

        let seq = record.seq;
        self.events.publish(StoreEvent::TransitionApplied {
            meta: EventMeta::new(EVENT_SOURCE),
            record,
            group_count: snapshot.len(),
        });
        self.persist(seq, Arc::clone(&snapshot));

        Ok(snapshot)
    }

    /// Appends an empty named group and returns its index.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock is poisoned.
    pub fn create_group(&self, name: impl Into<String>) -> Result<usize> {
        let snapshot = self.dispatch(Transition::CreateGroup { name: name.into() })?;
        Ok(snapshot.len().saturating_sub(1))
    }

    /// Brings the collection in line with the source table and checks it.
    ///
    /// Grouped sources missing from `sources` are dropped through
    /// `SourceDeleted`; known sources that no group holds are appended
    /// through `SourceAdded`. Both go through [`dispatch`](Self::dispatch),
    /// so repairs are logged and saved like any other transition. Returns
    /// the number of repairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`] if the collection is still
    /// inconsistent afterwards (a source held by two groups).
    pub fn reconcile(&self, sources: &SourceTable) -> Result<usize> {
        let snapshot = self.snapshot()?;
        let dangling: BTreeSet<SourceId> = snapshot
            .iter()
            .flat_map(|group| &group.sids)
            .filter(|sid| !sources.contains_key(sid))
            .copied()
            .collect();
        let ungrouped: Vec<SourceId> = sources
            .keys()
            .filter(|sid| position_of(&snapshot, **sid).is_none())
            .copied()
            .collect();

        for &sid in &dangling {
            tracing::warn!(sid = %sid, "Dropping grouped source missing from the source table");
            self.dispatch(Transition::SourceDeleted { sid })?;
        }
        for &sid in &ungrouped {
            tracing::warn!(sid = %sid, "Regrouping source no group holds");
            self.dispatch(Transition::SourceAdded { sid })?;
        }

        check_invariants(&self.snapshot()?, sources)
            .map_err(|e| Error::InvariantViolation(format!("stored groups: {e}")))?;
        Ok(dangling.len() + ungrouped.len())
    }

    /// Waits for every scheduled save to finish.
    pub async fn flush(&self) {
        self.saves.flush().await;
    }

    fn persist(&self, seq: u64, snapshot: GroupSnapshot) {
        let gateway = Arc::clone(&self.gateway);
        let events = self.events.clone();
        self.saves.schedule(seq, move || {
            if let Err(e) = gateway.save_groups(&snapshot) {
                metrics::counter!("persistence_save_failed_total").increment(1);
                tracing::warn!(seq, error = %e, "Failed to save group collection");
                events.publish(StoreEvent::PersistenceFailed {
                    meta: EventMeta::new(EVENT_SOURCE),
                    seq,
                    error: e.to_string(),
                });
            }
        });
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|e| Error::OperationFailed {
            operation: "lock_group_store".to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use crate::services::reducer::replay;
    use crate::storage::MemoryGateway;

    fn sid(id: u32) -> SourceId {
        SourceId::new(id)
    }

    #[test]
    fn test_dispatch_publishes_new_snapshot_and_keeps_old() {
        let store = GroupStore::new(Arc::new(MemoryGateway::new()), Vec::new());
        let before = store.snapshot().unwrap();

        store.dispatch(Transition::SourceAdded { sid: sid(1) }).unwrap();
        let after = store.snapshot().unwrap();

        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_rejected_transition_leaves_state_and_log() {
        let store = GroupStore::new(Arc::new(MemoryGateway::new()), Vec::new());
        store.dispatch(Transition::SourceAdded { sid: sid(1) }).unwrap();
        let before = store.snapshot().unwrap();

        let err = store
            .dispatch(Transition::DeleteGroup { group_index: 5 })
            .unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
        assert!(Arc::ptr_eq(&before, &store.snapshot().unwrap()));
        assert_eq!(store.transition_log().unwrap().len(), 1);
    }

    #[test]
    fn test_create_group_returns_index() {
        let store = GroupStore::new(
            Arc::new(MemoryGateway::new()),
            vec![SourceGroup::single(sid(1))],
        );
        assert_eq!(store.create_group("Tech").unwrap(), 1);
        assert_eq!(store.create_group("News").unwrap(), 2);
    }

    #[test]
    fn test_saves_inline_without_runtime() {
        let gateway = Arc::new(MemoryGateway::new());
        let store = GroupStore::new(gateway.clone(), Vec::new());
        store.dispatch(Transition::SourceAdded { sid: sid(1) }).unwrap();
        store.dispatch(Transition::SourceAdded { sid: sid(2) }).unwrap();

        assert_eq!(gateway.group_saves(), 2);
        assert_eq!(gateway.load_groups().unwrap().len(), 2);
    }

    #[test]
    fn test_log_replays_to_snapshot() {
        let initial = vec![SourceGroup::single(sid(1)), SourceGroup::single(sid(2))];
        let store = GroupStore::new(Arc::new(MemoryGateway::new()), initial);
        let tech = store.create_group("Tech").unwrap();
        store
            .dispatch(Transition::AddSourceToGroup {
                group_index: tech,
                sid: sid(2),
            })
            .unwrap();
        store.dispatch(Transition::ReorderGroups { order: vec![1, 0] }).unwrap();

        let log = store.transition_log().unwrap();
        assert_eq!(log.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![1, 2, 3]);

        let replayed = replay(&store.initial_snapshot().unwrap(), &log).unwrap();
        assert_eq!(replayed, *store.snapshot().unwrap());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_memory_state_and_publishes() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.set_fail_saves(true);
        let store = GroupStore::new(gateway.clone(), Vec::new());
        let mut failures = store.events().subscribe_event_type("persistence.failed");

        store.dispatch(Transition::SourceAdded { sid: sid(7) }).unwrap();
        store.flush().await;

        assert_eq!(store.snapshot().unwrap().len(), 1);
        assert!(gateway.load_groups().unwrap().is_empty());
        let event = failures.recv().await.unwrap();
        assert!(matches!(event, StoreEvent::PersistenceFailed { seq: 1, .. }));
    }

    #[tokio::test]
    async fn test_flush_waits_for_latest_snapshot() {
        let gateway = Arc::new(MemoryGateway::new());
        let store = GroupStore::new(gateway.clone(), Vec::new());
        for id in 1..=5 {
            store.dispatch(Transition::SourceAdded { sid: sid(id) }).unwrap();
        }
        store.flush().await;

        assert_eq!(gateway.load_groups().unwrap(), *store.snapshot().unwrap());
    }

    #[test]
    fn test_open_rejects_malformed_stored_group() {
        let mut broken = SourceGroup::single(sid(1));
        broken.sids.clear();
        let gateway = Arc::new(MemoryGateway::with_state(vec![broken], Default::default()));

        assert!(GroupStore::open(gateway).is_err());
    }

    fn table(ids: &[u32]) -> SourceTable {
        ids.iter()
            .map(|&id| (sid(id), Source::new(sid(id), format!("https://s{id}.example.com/feed"), "S")))
            .collect()
    }

    #[test]
    fn test_reconcile_repairs_dangling_and_ungrouped_sources() {
        let stored = vec![
            SourceGroup::named("Tech").with_sids([sid(1), sid(2)]),
            SourceGroup::single(sid(3)),
        ];
        let sources = table(&[1, 3, 4]);
        let gateway = Arc::new(MemoryGateway::with_state(stored, sources.clone()));
        let store = GroupStore::open(gateway.clone()).unwrap();

        assert_eq!(store.reconcile(&sources).unwrap(), 2);

        let snapshot = store.snapshot().unwrap();
        check_invariants(&snapshot, &sources).unwrap();
        assert_eq!(snapshot[0].sids, vec![sid(1)]);
        assert_eq!(snapshot.last().unwrap().sids, vec![sid(4)]);
        assert_eq!(gateway.load_groups().unwrap(), *snapshot);
    }

    #[test]
    fn test_reconcile_leaves_consistent_state_alone() {
        let sources = table(&[1]);
        let store = GroupStore::new(
            Arc::new(MemoryGateway::new()),
            vec![SourceGroup::single(sid(1))],
        );
        assert_eq!(store.reconcile(&sources).unwrap(), 0);
        assert!(store.transition_log().unwrap().is_empty());
    }

    #[test]
    fn test_reconcile_rejects_source_in_two_groups() {
        let stored = vec![
            SourceGroup::named("A").with_sids([sid(1), sid(2)]),
            SourceGroup::named("B").with_sids([sid(2), sid(3)]),
        ];
        let store = GroupStore::new(Arc::new(MemoryGateway::new()), stored);

        let err = store.reconcile(&table(&[1, 2, 3])).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }
}
