//! Group command handlers.

use clap::Subcommand;
use feedgroups::models::{SourceId, Transition};
use feedgroups::{Error, Result};

use super::App;

/// Group subcommands.
#[derive(Subcommand)]
pub enum GroupsAction {
    /// List groups in display order.
    List,

    /// Create an empty named group.
    Create {
        /// Group name.
        name: String,
    },

    /// Rename a named group.
    Rename {
        /// Group index.
        index: usize,
        /// New name.
        name: String,
    },

    /// Delete a group; its sources become ungrouped.
    Delete {
        /// Group index.
        index: usize,
    },

    /// Move a source into a named group.
    Add {
        /// Target group index.
        index: usize,
        /// Source identity.
        sid: SourceId,
    },

    /// Take sources out of a named group.
    Remove {
        /// Group index.
        index: usize,
        /// Source identities.
        #[arg(required = true)]
        sids: Vec<SourceId>,
    },

    /// Reorder groups: list every current index in the new order.
    Reorder {
        /// Current indices in their new order.
        #[arg(required = true)]
        order: Vec<usize>,
    },

    /// Toggle a group's expanded flag.
    Toggle {
        /// Group index.
        index: usize,
    },
}

/// Executes a group subcommand.
pub fn cmd_groups(app: &App, action: GroupsAction) -> Result<()> {
    let transition = match action {
        GroupsAction::List => return list_groups(app),
        GroupsAction::Create { name } => {
            let index = app.store.create_group(name.clone())?;
            println!("Created group {index}: {name}");
            return Ok(());
        },
        GroupsAction::Rename { index, name } => {
            let snapshot = app.store.snapshot()?;
            let mut group = snapshot
                .get(index)
                .filter(|g| g.is_multiple)
                .cloned()
                .ok_or_else(|| Error::InvalidInput(format!("no named group at index {index}")))?;
            group.name = Some(name);
            Transition::UpdateGroup {
                group_index: index,
                group,
            }
        },
        GroupsAction::Delete { index } => Transition::DeleteGroup { group_index: index },
        GroupsAction::Add { index, sid } => Transition::AddSourceToGroup {
            group_index: index,
            sid,
        },
        GroupsAction::Remove { index, sids } => Transition::RemoveSourceFromGroup {
            group_index: index,
            sids,
        },
        GroupsAction::Reorder { order } => Transition::ReorderGroups { order },
        GroupsAction::Toggle { index } => Transition::ToggleExpansion { group_index: index },
    };

    let name = transition.name();
    let snapshot = app.store.dispatch(transition)?;
    println!("Applied {name}: {} groups", snapshot.len());
    Ok(())
}

fn list_groups(app: &App) -> Result<()> {
    let snapshot = app.store.snapshot()?;
    if snapshot.is_empty() {
        println!("No groups.");
        return Ok(());
    }

    let sources = app.catalog.table()?;
    let source_name = |sid: &SourceId| {
        sources
            .get(sid)
            .map_or_else(|| format!("<missing {sid}>"), |s| s.name.clone())
    };

    for (index, group) in snapshot.iter().enumerate() {
        if group.is_multiple {
            let marker = if group.expanded { "-" } else { "+" };
            println!("{index:>3} {marker} {} ({})", group.display_name(), group.sids.len());
            if group.expanded {
                for sid in &group.sids {
                    println!("        [{sid}] {}", source_name(sid));
                }
            }
        } else {
            for sid in &group.sids {
                println!("{index:>3}   [{sid}] {}", source_name(sid));
            }
        }
    }
    Ok(())
}
