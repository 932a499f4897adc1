//! Workspace folder publish and unpublish.
//!
//! Folders are created parent first and deleted child first. A repository
//! folder implies all of its ancestors, whether or not the manifest lists
//! them.

use std::collections::BTreeSet;

use tracing::{info, warn};
use weft_core::folders::{folder_depth, folder_name, parent_folder};
use weft_core::FolderMap;

use crate::error::SyncError;
use crate::snapshot::{SyncContext, WorkspaceSnapshot};

/// Create every repository folder missing from the workspace, then rebind
/// `repository_folders` to the deployed ids so scanned items land in the
/// right place. Returns the number of folders created.
pub async fn publish_folders(
    ctx: &SyncContext,
    snapshot: &mut WorkspaceSnapshot,
) -> Result<usize, SyncError> {
    info!("Publishing Folders");
    let mut created = 0;
    for path in parent_first(&wanted_paths(&snapshot.repository_folders)) {
        if snapshot.deployed_folders.contains_key(&path) {
            continue;
        }
        let parent_id = parent_folder(&path)
            .and_then(|parent| snapshot.deployed_folders.get(parent))
            .cloned();
        info!("Publishing folder: {path}");
        let id = ctx
            .client
            .create_folder(folder_name(&path), parent_id.as_deref())
            .await?;
        info!("    Published with ID {id}");
        snapshot.deployed_folders.insert(path, id);
        created += 1;
    }

    for (path, id) in snapshot.repository_folders.iter_mut() {
        if let Some(deployed) = snapshot.deployed_folders.get(path) {
            id.clone_from(deployed);
        }
    }
    Ok(created)
}

/// Delete deployed folders the repository no longer has, deepest first.
/// Failures are logged and counted, never returned.
pub async fn unpublish_folders(ctx: &SyncContext, snapshot: &WorkspaceSnapshot) -> FolderReport {
    info!("Unpublishing Folders");
    let wanted = wanted_paths(&snapshot.repository_folders);
    let mut report = FolderReport::default();
    for path in folders_to_delete(&snapshot.deployed_folders, &wanted) {
        let Some(id) = snapshot.deployed_folders.get(&path) else {
            continue;
        };
        info!("Unpublishing folder: {path}");
        match ctx.client.delete_folder(id).await {
            Ok(()) => report.deleted.push(path),
            Err(e) => {
                warn!("Failed to unpublish folder '{path}': {e}");
                report.failed.push(path);
            }
        }
    }
    report
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Repository folder paths plus every ancestor.
pub(crate) fn wanted_paths(folders: &FolderMap) -> BTreeSet<String> {
    let mut wanted = BTreeSet::new();
    for path in folders.keys() {
        let mut current = Some(path.as_str());
        while let Some(p) = current {
            if !wanted.insert(p.to_string()) {
                break;
            }
            current = parent_folder(p);
        }
    }
    wanted
}

pub(crate) fn parent_first(paths: &BTreeSet<String>) -> Vec<String> {
    let mut ordered: Vec<String> = paths.iter().cloned().collect();
    ordered.sort_by(|a, b| folder_depth(a).cmp(&folder_depth(b)).then_with(|| a.cmp(b)));
    ordered
}

/// Deployed paths absent from `wanted`, children before parents.
pub(crate) fn folders_to_delete(deployed: &FolderMap, wanted: &BTreeSet<String>) -> Vec<String> {
    let mut doomed: Vec<String> = deployed
        .keys()
        .filter(|p| !wanted.contains(*p))
        .cloned()
        .collect();
    doomed.sort_by(|a, b| folder_depth(b).cmp(&folder_depth(a)).then_with(|| a.cmp(b)));
    doomed
}
