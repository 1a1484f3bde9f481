//! Pure transition reducer for the group collection.
//!
//! [`apply`] maps a collection and a transition to a brand new collection.
//! The input slice is never touched, so snapshots handed out earlier stay
//! valid. A transition whose preconditions fail yields
//! [`Error::InvariantViolation`] and no new collection.
//!
//! Destructive operations re-materialize freed sources as one-source groups
//! at the vacated position rather than at the end of the collection, so the
//! user's arrangement is not reshuffled.

use crate::models::{SourceGroup, SourceId, Transition, TransitionRecord, position_of};
use crate::{Error, Result};

/// Applies one transition, returning the resulting collection.
///
/// # Errors
///
/// Returns [`Error::InvariantViolation`] if the transition's preconditions do
/// not hold for `groups`.
pub fn apply(groups: &[SourceGroup], transition: &Transition) -> Result<Vec<SourceGroup>> {
    match transition {
        Transition::SourceAdded { sid } => source_added(groups, *sid),
        Transition::SourceDeleted { sid } => source_deleted(groups, *sid),
        Transition::CreateGroup { name } => {
            let mut next = groups.to_vec();
            next.push(SourceGroup::named(name.clone()));
            Ok(next)
        },
        Transition::AddSourceToGroup { group_index, sid } => {
            add_source_to_group(groups, *group_index, *sid)
        },
        Transition::RemoveSourceFromGroup { group_index, sids } => {
            remove_source_from_group(groups, *group_index, sids)
        },
        Transition::UpdateGroup { group_index, group } => {
            update_group(groups, *group_index, group)
        },
        Transition::ReorderGroups { order } => reorder_groups(groups, order),
        Transition::DeleteGroup { group_index } => delete_group(groups, *group_index),
        Transition::ToggleExpansion { group_index } => {
            group_at(groups, *group_index)?;
            let mut next = groups.to_vec();
            next[*group_index].expanded = !next[*group_index].expanded;
            Ok(next)
        },
    }
}

/// Rebuilds a collection by applying logged transitions in order.
///
/// # Errors
///
/// Returns the first [`Error::InvariantViolation`] encountered, annotated with
/// the offending sequence number.
pub fn replay(initial: &[SourceGroup], records: &[TransitionRecord]) -> Result<Vec<SourceGroup>> {
    records.iter().try_fold(initial.to_vec(), |groups, record| {
        apply(&groups, &record.transition).map_err(|e| {
            Error::InvariantViolation(format!("replay stopped at seq {}: {e}", record.seq))
        })
    })
}

fn violation(message: String) -> Error {
    Error::InvariantViolation(message)
}

fn group_at(groups: &[SourceGroup], index: usize) -> Result<&SourceGroup> {
    groups.get(index).ok_or_else(|| {
        violation(format!(
            "group index {index} out of range ({} groups)",
            groups.len()
        ))
    })
}

fn named_group_at(groups: &[SourceGroup], index: usize) -> Result<&SourceGroup> {
    let group = group_at(groups, index)?;
    if !group.is_multiple {
        return Err(violation(format!("group {index} is a one-source group")));
    }
    Ok(group)
}

fn source_added(groups: &[SourceGroup], sid: SourceId) -> Result<Vec<SourceGroup>> {
    if let Some(index) = position_of(groups, sid) {
        return Err(violation(format!(
            "source {sid} is already in group {index}"
        )));
    }
    let mut next = groups.to_vec();
    next.push(SourceGroup::single(sid));
    Ok(next)
}

fn source_deleted(groups: &[SourceGroup], sid: SourceId) -> Result<Vec<SourceGroup>> {
    let owners: Vec<usize> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.contains(sid))
        .map(|(i, _)| i)
        .collect();
    let index = match owners.as_slice() {
        [index] => *index,
        [] => return Err(violation(format!("source {sid} is not in any group"))),
        _ => {
            return Err(violation(format!(
                "source {sid} appears in groups {owners:?}"
            )));
        },
    };

    let mut next = groups.to_vec();
    next[index].sids.retain(|s| *s != sid);
    if next[index].sids.is_empty() {
        next.remove(index);
    }
    Ok(next)
}

fn add_source_to_group(
    groups: &[SourceGroup],
    group_index: usize,
    sid: SourceId,
) -> Result<Vec<SourceGroup>> {
    let target = named_group_at(groups, group_index)?;
    if target.contains(sid) {
        return Err(violation(format!(
            "source {sid} is already in group {group_index}"
        )));
    }
    let previous = position_of(groups, sid);
    if let Some(index) = previous.filter(|&i| groups[i].is_multiple) {
        return Err(violation(format!(
            "source {sid} already belongs to named group {index}"
        )));
    }

    let mut next = groups.to_vec();
    next[group_index].sids.push(sid);
    if let Some(index) = previous {
        next.remove(index);
    }
    Ok(next)
}

fn remove_source_from_group(
    groups: &[SourceGroup],
    group_index: usize,
    sids: &[SourceId],
) -> Result<Vec<SourceGroup>> {
    let target = named_group_at(groups, group_index)?;
    let mut removed: Vec<SourceId> = Vec::with_capacity(sids.len());
    for sid in sids {
        if !target.contains(*sid) {
            return Err(violation(format!(
                "source {sid} is not in group {group_index}"
            )));
        }
        if !removed.contains(sid) {
            removed.push(*sid);
        }
    }

    let mut kept = target.clone();
    kept.sids.retain(|s| !removed.contains(s));

    let mut next = Vec::with_capacity(groups.len() + removed.len());
    next.extend_from_slice(&groups[..group_index]);
    next.push(kept);
    next.extend(removed.into_iter().map(SourceGroup::single));
    next.extend_from_slice(&groups[group_index + 1..]);
    Ok(next)
}

fn update_group(
    groups: &[SourceGroup],
    group_index: usize,
    group: &SourceGroup,
) -> Result<Vec<SourceGroup>> {
    let current = group_at(groups, group_index)?;
    group.validate()?;

    let mut before = current.sids.clone();
    let mut after = group.sids.clone();
    before.sort_unstable();
    after.sort_unstable();
    if before != after {
        return Err(violation(format!(
            "update of group {group_index} changes its members"
        )));
    }

    let mut next = groups.to_vec();
    next[group_index] = group.clone();
    Ok(next)
}

fn reorder_groups(groups: &[SourceGroup], order: &[usize]) -> Result<Vec<SourceGroup>> {
    if order.len() != groups.len() {
        return Err(violation(format!(
            "reorder lists {} groups, collection has {}",
            order.len(),
            groups.len()
        )));
    }
    let mut placed = vec![false; groups.len()];
    for &index in order {
        match placed.get_mut(index) {
            Some(slot) if !*slot => *slot = true,
            Some(_) => return Err(violation(format!("reorder repeats group {index}"))),
            None => return Err(violation(format!("reorder names unknown group {index}"))),
        }
    }
    Ok(order.iter().map(|&i| groups[i].clone()).collect())
}

fn delete_group(groups: &[SourceGroup], group_index: usize) -> Result<Vec<SourceGroup>> {
    let target = group_at(groups, group_index)?;

    let mut next = Vec::with_capacity(groups.len() + target.sids.len());
    next.extend_from_slice(&groups[..group_index]);
    next.extend(target.sids.iter().copied().map(SourceGroup::single));
    next.extend_from_slice(&groups[group_index + 1..]);
    Ok(next)
}
