//! Orphan removal: deployed items (and folders) the repository no longer has.

use regex::Regex;
use tracing::{debug, info, warn};
use weft_core::catalog::UNPUBLISH_ORDER;
use weft_core::ItemType;

use crate::error::SyncError;
use crate::fetch::{
    refresh_deployed_folders, refresh_deployed_items, refresh_repository_folders,
    refresh_repository_items,
};
use crate::folders::{unpublish_folders, FolderReport};
use crate::snapshot::{SyncContext, WorkspaceSnapshot};

/// What an unpublish run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpublishReport {
    pub deleted: Vec<(ItemType, String)>,
    pub failed: Vec<(ItemType, String)>,
    pub folders: FolderReport,
}

/// Names deployed under `item_type` but absent from the repository, minus
/// names matching `exclude`. Sorted.
pub fn orphans(snapshot: &WorkspaceSnapshot, item_type: ItemType, exclude: Option<&Regex>) -> Vec<String> {
    let Some(deployed) = snapshot.deployed_items.get(&item_type) else {
        return Vec::new();
    };
    let repository = snapshot.repository_items.get(&item_type);
    deployed
        .keys()
        .filter(|name| !repository.is_some_and(|r| r.contains_key(*name)))
        .filter(|name| {
            let excluded = exclude.is_some_and(|re| re.is_match(name));
            if excluded {
                debug!("keeping orphaned {item_type} '{name}': matches exclude regex");
            }
            !excluded
        })
        .cloned()
        .collect()
}

/// Types whose orphans this run may delete, in deletion order.
pub fn unpublish_types(ctx: &SyncContext) -> Vec<ItemType> {
    UNPUBLISH_ORDER
        .into_iter()
        .filter(|t| ctx.in_scope(*t))
        .filter(|t| ctx.config.features.unpublish_enabled(*t))
        .collect()
}

/// Delete every orphaned item, downstream consumers first, then every
/// orphaned folder.
///
/// Only snapshot refreshes can fail the run; individual deletes that fail are
/// logged as warnings and listed in the report.
pub async fn unpublish_all_orphans(
    ctx: &SyncContext,
    snapshot: &mut WorkspaceSnapshot,
    exclude: Option<&Regex>,
) -> Result<UnpublishReport, SyncError> {
    refresh_deployed_items(ctx, snapshot).await?;
    refresh_repository_folders(ctx, snapshot)?;
    refresh_repository_items(ctx, snapshot)?;

    info!("Unpublishing Orphaned Items");
    let mut report = UnpublishReport::default();
    for item_type in unpublish_types(ctx) {
        for name in orphans(snapshot, item_type, exclude) {
            let Some(guid) = snapshot
                .deployed_item(item_type, &name)
                .map(|i| i.guid.clone())
            else {
                continue;
            };
            info!("Unpublishing {item_type} '{name}'");
            match ctx.client.delete_item(&guid).await {
                Ok(()) => {
                    info!("    Unpublished");
                    report.deleted.push((item_type, name));
                }
                Err(e) => {
                    warn!("Failed to unpublish {item_type} '{name}': {e}");
                    report.failed.push((item_type, name));
                }
            }
        }
    }

    refresh_deployed_items(ctx, snapshot).await?;
    refresh_deployed_folders(ctx, snapshot).await?;
    if ctx.folder_publish() {
        report.folders = unpublish_folders(ctx, snapshot).await;
    }
    Ok(report)
}
