//! Shared publish entrypoint used by the CLI.

use tracing::{debug, error, info, warn};
use weft_core::ItemType;

use crate::error::SyncError;
use crate::fetch::{
    refresh_deployed_folders, refresh_deployed_items, refresh_repository_folders,
    refresh_repository_items,
};
use crate::folders::publish_folders;
use crate::publish::{publish_item, PublishAction, PublishResult};
use crate::snapshot::{SyncContext, WorkspaceSnapshot};

/// What a publish run did.
#[derive(Debug, Default)]
pub struct PublishReport {
    pub folders_created: usize,
    pub results: Vec<PublishResult>,
    /// Item failures collected under `continue_on_error`.
    pub failures: Vec<SyncError>,
}

impl PublishReport {
    pub fn count(&self, action: PublishAction) -> usize {
        self.results.iter().filter(|r| r.action == action).count()
    }

    /// `Err(Incomplete)` when any item failed.
    pub fn ensure_complete(&self) -> Result<(), SyncError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Incomplete {
                failed: self.failures.len(),
                attempted: self.failures.len() + self.results.len(),
            })
        }
    }
}

/// Publish every in-scope repository item.
///
/// Folders go first, then item types in dependency order (variable
/// libraries and storage before the notebooks, models and pipelines that
/// reference them). When parameter rules use `$items` expressions, the
/// deployed snapshot is refreshed before each type that follows a create so
/// the new guids resolve.
pub async fn publish_all(
    ctx: &SyncContext,
    snapshot: &mut WorkspaceSnapshot,
) -> Result<PublishReport, SyncError> {
    let mut report = PublishReport::default();

    if ctx.folder_publish() {
        refresh_deployed_folders(ctx, snapshot).await?;
        refresh_repository_folders(ctx, snapshot)?;
        report.folders_created = publish_folders(ctx, snapshot).await?;
    }

    refresh_deployed_items(ctx, snapshot).await?;
    refresh_repository_items(ctx, snapshot)?;

    if ctx.item_name_exclude.is_some() {
        warn!("Using an item name exclude regex is risky as it can prevent needed dependencies from being deployed");
    }

    let resolve_items = ctx
        .parameters
        .as_ref()
        .is_some_and(|p| p.references_items());
    let mut created_since_refresh = false;

    for item_type in ItemType::ALL.into_iter().filter(|t| ctx.in_scope(*t)) {
        let names = snapshot.repository_names(item_type);
        if names.is_empty() {
            debug!("no {} in repository", item_type.plural_label());
            continue;
        }
        info!("Publishing {}", item_type.plural_label());

        if resolve_items && created_since_refresh {
            debug!("refreshing deployed items for $items references");
            refresh_deployed_items(ctx, snapshot).await?;
            created_since_refresh = false;
        }

        for name in names {
            match publish_item(ctx, snapshot, item_type, &name).await {
                Ok(result) => {
                    created_since_refresh |= result.action == PublishAction::Create;
                    report.results.push(result);
                }
                Err(e) if ctx.config.continue_on_error => {
                    error!("{e}");
                    report.failures.push(e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    info!(
        "publish finished: {} created, {} updated, {} patched, {} skipped, {} failed",
        report.count(PublishAction::Create),
        report.count(PublishAction::UpdateDefinition),
        report.count(PublishAction::PatchMetadata),
        report.count(PublishAction::Skip),
        report.failures.len()
    );
    Ok(report)
}
