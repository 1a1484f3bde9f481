//! Store event types for observability.

use super::transition::TransitionRecord;
use crate::current_timestamp;
use uuid::Uuid;

/// Shared event metadata.
#[derive(Debug, Clone)]
pub struct EventMeta {
    /// Unique identifier for this event.
    pub event_id: String,
    /// Event source component.
    pub source: &'static str,
    /// Timestamp (Unix epoch seconds).
    pub timestamp: u64,
}

impl EventMeta {
    /// Creates new event metadata using the current timestamp.
    #[must_use]
    pub fn new(source: &'static str) -> Self {
        Self::with_timestamp(source, current_timestamp())
    }

    /// Creates new event metadata with a specified timestamp.
    #[must_use]
    pub fn with_timestamp(source: &'static str, timestamp: u64) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            source,
            timestamp,
        }
    }
}

/// Events emitted by the group store and its collaborators.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A transition was accepted and applied.
    TransitionApplied {
        /// Event metadata.
        meta: EventMeta,
        /// The log record of the transition.
        record: TransitionRecord,
        /// Number of groups after the transition.
        group_count: usize,
    },
    /// A transition was rejected because its preconditions did not hold.
    TransitionRejected {
        /// Event metadata.
        meta: EventMeta,
        /// Transition name.
        transition: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// A best-effort save of the collection failed.
    PersistenceFailed {
        /// Event metadata.
        meta: EventMeta,
        /// Sequence number of the snapshot that was not saved.
        seq: u64,
        /// Error message.
        error: String,
    },
}

impl StoreEvent {
    /// Returns the event type name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::TransitionApplied { .. } => "transition.applied",
            Self::TransitionRejected { .. } => "transition.rejected",
            Self::PersistenceFailed { .. } => "persistence.failed",
        }
    }

    /// Returns the event metadata.
    #[must_use]
    pub const fn meta(&self) -> &EventMeta {
        match self {
            Self::TransitionApplied { meta, .. }
            | Self::TransitionRejected { meta, .. }
            | Self::PersistenceFailed { meta, .. } => meta,
        }
    }
}
