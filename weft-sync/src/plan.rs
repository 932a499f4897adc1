//! Dry-run support for `weft plan`.
//!
//! Reads both sides exactly as a publish would, then reports what publish
//! and unpublish would do. No remote writes are issued.

use regex::Regex;
use weft_core::ItemType;

use crate::error::SyncError;
use crate::fetch::{
    refresh_deployed_folders, refresh_deployed_items, refresh_repository_folders,
    refresh_repository_items,
};
use crate::folders::{folders_to_delete, parent_first, wanted_paths};
use crate::publish::{decide_action, move_target, PublishAction};
use crate::snapshot::{SyncContext, WorkspaceSnapshot};
use crate::unpublish::{orphans, unpublish_types};

/// One repository item and what publishing it would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedItem {
    pub item_type: ItemType,
    pub name: String,
    pub action: PublishAction,
    /// Target folder id when the item would be moved; empty is the root.
    pub move_to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub items: Vec<PlannedItem>,
    pub orphans: Vec<(ItemType, String)>,
    pub folders_to_create: Vec<String>,
    pub folders_to_delete: Vec<String>,
}

impl Plan {
    /// Number of remote writes the plan implies.
    pub fn change_count(&self) -> usize {
        let item_writes: usize = self
            .items
            .iter()
            .map(|i| usize::from(i.action != PublishAction::Skip) + usize::from(i.move_to.is_some()))
            .sum();
        item_writes + self.orphans.len() + self.folders_to_create.len() + self.folders_to_delete.len()
    }
}

/// Build the plan. `exclude` is the unpublish name-exclude regex.
pub async fn plan(
    ctx: &SyncContext,
    snapshot: &mut WorkspaceSnapshot,
    exclude: Option<&Regex>,
) -> Result<Plan, SyncError> {
    refresh_deployed_items(ctx, snapshot).await?;
    refresh_deployed_folders(ctx, snapshot).await?;
    refresh_repository_folders(ctx, snapshot)?;

    let mut plan = Plan::default();
    if ctx.folder_publish() {
        let wanted = wanted_paths(&snapshot.repository_folders);
        plan.folders_to_create = parent_first(&wanted)
            .into_iter()
            .filter(|p| !snapshot.deployed_folders.contains_key(p))
            .collect();
        plan.folders_to_delete = folders_to_delete(&snapshot.deployed_folders, &wanted);
        // Same rebinding publish_folders performs for folders that already exist.
        for (path, id) in snapshot.repository_folders.iter_mut() {
            if let Some(deployed) = snapshot.deployed_folders.get(path) {
                id.clone_from(deployed);
            }
        }
    }
    refresh_repository_items(ctx, snapshot)?;

    for item_type in ItemType::ALL.into_iter().filter(|t| ctx.in_scope(*t)) {
        let Some(items) = snapshot.repository_items.get(&item_type) else {
            continue;
        };
        for item in items.values() {
            let action = decide_action(ctx, item);
            let move_to = match action {
                PublishAction::Skip => None,
                _ => move_target(ctx, snapshot, item),
            };
            plan.items.push(PlannedItem {
                item_type,
                name: item.name().to_string(),
                action,
                move_to,
            });
        }
    }

    for item_type in unpublish_types(ctx) {
        for name in orphans(snapshot, item_type, exclude) {
            plan.orphans.push((item_type, name));
        }
    }
    Ok(plan)
}
