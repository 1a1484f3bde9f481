//! Named state transitions accepted by the group store.

use super::group::SourceGroup;
use super::source::SourceId;
use serde::{Deserialize, Serialize};

/// A discrete, named change to the group collection.
///
/// Group indices always refer to the collection as it was before the
/// transition is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    /// A source was created; it gets its own one-source group.
    SourceAdded {
        /// The new source.
        sid: SourceId,
    },
    /// A source was deleted from the source table.
    SourceDeleted {
        /// The deleted source.
        sid: SourceId,
    },
    /// An empty user-named group is appended.
    CreateGroup {
        /// Display name.
        name: String,
    },
    /// A source moves into a user-named group.
    AddSourceToGroup {
        /// Target group.
        group_index: usize,
        /// Source to move.
        sid: SourceId,
    },
    /// Sources leave a user-named group and become one-source groups.
    RemoveSourceFromGroup {
        /// Group to remove from.
        group_index: usize,
        /// Sources to remove.
        sids: Vec<SourceId>,
    },
    /// A group is replaced wholesale (rename, member reorder).
    UpdateGroup {
        /// Group to replace.
        group_index: usize,
        /// Replacement.
        group: SourceGroup,
    },
    /// The collection is permuted; position `i` receives old group `order[i]`.
    ReorderGroups {
        /// Old indices in their new order.
        order: Vec<usize>,
    },
    /// A group is removed; its members become one-source groups in place.
    DeleteGroup {
        /// Group to delete.
        group_index: usize,
    },
    /// The presentation-only expansion flag flips.
    ToggleExpansion {
        /// Group to toggle.
        group_index: usize,
    },
}

impl Transition {
    /// Returns the transition name used in logs and events.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SourceAdded { .. } => "source_added",
            Self::SourceDeleted { .. } => "source_deleted",
            Self::CreateGroup { .. } => "create_group",
            Self::AddSourceToGroup { .. } => "add_source_to_group",
            Self::RemoveSourceFromGroup { .. } => "remove_source_from_group",
            Self::UpdateGroup { .. } => "update_group",
            Self::ReorderGroups { .. } => "reorder_groups",
            Self::DeleteGroup { .. } => "delete_group",
            Self::ToggleExpansion { .. } => "toggle_expansion",
        }
    }
}

/// One accepted transition in the store's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Position in the log, starting at 1.
    pub seq: u64,
    /// When the transition was applied (Unix epoch seconds).
    pub timestamp: u64,
    /// The transition itself.
    pub transition: Transition,
}
