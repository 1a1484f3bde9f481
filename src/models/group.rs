//! Source group models.
//!
//! A group is either a user-named bucket holding any number of sources
//! (`is_multiple = true`) or the implicit one-source group that holds a
//! source not placed anywhere else.
//!
//! # Invariants
//!
//! - A one-source group holds exactly one source identity.
//! - Every source in the source table appears in exactly one group.
//!
//! [`check_invariants`] verifies both over a whole collection.

use super::source::{SourceId, SourceTable};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// An ordered bucket of source identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroup {
    /// Whether this is a user-named group.
    pub is_multiple: bool,
    /// Member identities, in display order.
    pub sids: Vec<SourceId>,
    /// Display name (meaningful for user-named groups only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the group is shown expanded.
    #[serde(default = "default_expanded")]
    pub expanded: bool,
}

const fn default_expanded() -> bool {
    true
}

impl SourceGroup {
    /// Creates the implicit group for a single source.
    #[must_use]
    pub fn single(sid: SourceId) -> Self {
        Self {
            is_multiple: false,
            sids: vec![sid],
            name: None,
            expanded: true,
        }
    }

    /// Creates an empty user-named group.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            is_multiple: true,
            sids: Vec::new(),
            name: Some(name.into()),
            expanded: true,
        }
    }

    /// Adds members to a user-named group.
    #[must_use]
    pub fn with_sids(mut self, sids: impl IntoIterator<Item = SourceId>) -> Self {
        self.sids.extend(sids);
        self
    }

    /// Returns `true` if the group holds the given source.
    #[must_use]
    pub fn contains(&self, sid: SourceId) -> bool {
        self.sids.contains(&sid)
    }

    /// Returns the display name, or an empty string for one-source groups.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Checks the per-group invariant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`] if a one-source group does not
    /// hold exactly one member.
    pub fn validate(&self) -> Result<()> {
        if !self.is_multiple && self.sids.len() != 1 {
            return Err(Error::InvariantViolation(format!(
                "one-source group holds {} sources",
                self.sids.len()
            )));
        }
        Ok(())
    }
}

/// Immutable snapshot of the whole group collection.
///
/// Snapshots are shared, never mutated; each accepted transition publishes a
/// new one.
pub type GroupSnapshot = Arc<Vec<SourceGroup>>;

/// Returns the index of the group holding `sid`, if any.
#[must_use]
pub fn position_of(groups: &[SourceGroup], sid: SourceId) -> Option<usize> {
    groups.iter().position(|g| g.contains(sid))
}

/// Verifies the collection-wide invariants against a source table.
///
/// # Errors
///
/// Returns [`Error::InvariantViolation`] naming the first problem found:
/// a malformed one-source group, a source grouped twice, a grouped source
/// missing from the table, or a known source that no group holds.
pub fn check_invariants(groups: &[SourceGroup], sources: &SourceTable) -> Result<()> {
    let mut seen = HashSet::new();
    for (index, group) in groups.iter().enumerate() {
        group
            .validate()
            .map_err(|e| Error::InvariantViolation(format!("group {index}: {e}")))?;
        for sid in &group.sids {
            if !seen.insert(*sid) {
                return Err(Error::InvariantViolation(format!(
                    "source {sid} appears in more than one group"
                )));
            }
            if !sources.contains_key(sid) {
                return Err(Error::InvariantViolation(format!(
                    "group {index} references unknown source {sid}"
                )));
            }
        }
    }
    if let Some(orphan) = sources.keys().find(|sid| !seen.contains(*sid)) {
        return Err(Error::InvariantViolation(format!(
            "source {orphan} is not in any group"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;

    fn table(ids: &[u32]) -> SourceTable {
        ids.iter()
            .map(|&id| {
                let sid = SourceId::new(id);
                (sid, Source::new(sid, format!("https://s{id}.example/feed"), format!("S{id}")))
            })
            .collect()
    }

    #[test]
    fn test_single_group_validates() {
        assert!(SourceGroup::single(SourceId::new(1)).validate().is_ok());

        let mut broken = SourceGroup::single(SourceId::new(1));
        broken.sids.push(SourceId::new(2));
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_empty_named_group_is_valid() {
        assert!(SourceGroup::named("Tech").validate().is_ok());
    }

    #[test]
    fn test_check_invariants_detects_duplicates_and_orphans() {
        let sources = table(&[1, 2, 3]);
        let good = vec![
            SourceGroup::named("Tech").with_sids([SourceId::new(1), SourceId::new(3)]),
            SourceGroup::single(SourceId::new(2)),
        ];
        assert!(check_invariants(&good, &sources).is_ok());

        let duplicated = vec![
            SourceGroup::named("Tech").with_sids([SourceId::new(1), SourceId::new(2)]),
            SourceGroup::single(SourceId::new(2)),
            SourceGroup::single(SourceId::new(3)),
        ];
        assert!(check_invariants(&duplicated, &sources).is_err());

        let orphaned = vec![SourceGroup::single(SourceId::new(1))];
        let err = check_invariants(&orphaned, &sources).unwrap_err();
        assert!(err.to_string().contains("not in any group"));
    }

    #[test]
    fn test_group_serde_defaults_expanded() {
        let group: SourceGroup = serde_json::from_str(r#"{"is_multiple": false, "sids": [4]}"#).unwrap();
        assert!(group.expanded);
        assert_eq!(group.sids, vec![SourceId::new(4)]);
        assert!(group.name.is_none());
    }
}
