//! Snapshot refreshers. Each replaces one side of the [`WorkspaceSnapshot`].

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};
use weft_api::RemoteFolder;
use weft_core::folders::{load_folder_manifest, normalize_folder_path};
use weft_core::{scan_repository, FolderMap, Item, ItemMap, ItemType};
use weft_params::{WorkspaceItemRef, WorkspaceItems};

use crate::error::SyncError;
use crate::snapshot::{SyncContext, WorkspaceSnapshot};

/// Rebuild `deployed_items` and `workspace_items` from the remote listing.
///
/// Remote types outside the catalog are ignored. Lakehouses additionally get
/// their SQL endpoint looked up for `$items.Lakehouse.<name>.sqlendpoint`.
pub async fn refresh_deployed_items(
    ctx: &SyncContext,
    snapshot: &mut WorkspaceSnapshot,
) -> Result<(), SyncError> {
    let remote = ctx.client.list_items().await?;
    let mut deployed = ItemMap::new();
    let mut workspace_items = WorkspaceItems::new();

    for entry in remote {
        let item_type: ItemType = match entry.item_type.parse() {
            Ok(t) => t,
            Err(_) => {
                debug!("ignoring deployed item '{}' of type {}", entry.display_name, entry.item_type);
                continue;
            }
        };
        let sql_endpoint = if item_type == ItemType::Lakehouse {
            let endpoint = ctx.client.lakehouse_sql_endpoint(&entry.id).await?;
            if endpoint.is_none() {
                debug!("no SQL endpoint for Lakehouse '{}'", entry.display_name);
            }
            endpoint
        } else {
            None
        };

        workspace_items.entry(item_type).or_default().insert(
            entry.display_name.clone(),
            WorkspaceItemRef {
                id: entry.id.clone(),
                sql_endpoint,
            },
        );
        let item = Item::new(
            item_type,
            entry.display_name.clone(),
            entry.description.unwrap_or_default(),
        )
        .with_guid(entry.id)
        .with_folder_id(entry.folder_id.unwrap_or_default());
        deployed
            .entry(item_type)
            .or_default()
            .insert(entry.display_name, item);
    }

    debug!(
        "deployed snapshot: {} items",
        deployed.values().map(BTreeMap::len).sum::<usize>()
    );
    snapshot.deployed_items = deployed;
    snapshot.workspace_items = workspace_items;
    Ok(())
}

/// Rebuild `deployed_folders` as `path → id`.
pub async fn refresh_deployed_folders(
    ctx: &SyncContext,
    snapshot: &mut WorkspaceSnapshot,
) -> Result<(), SyncError> {
    let remote = ctx.client.list_folders().await?;
    snapshot.deployed_folders = folder_paths(&remote);
    Ok(())
}

/// Reload the repository's folder manifest.
pub fn refresh_repository_folders(
    ctx: &SyncContext,
    snapshot: &mut WorkspaceSnapshot,
) -> Result<(), SyncError> {
    snapshot.repository_folders = load_folder_manifest(ctx.repository_root())?;
    Ok(())
}

/// Rescan the repository. Guids are carried forward from the current
/// deployed snapshot, so refresh that first.
pub fn refresh_repository_items(
    ctx: &SyncContext,
    snapshot: &mut WorkspaceSnapshot,
) -> Result<(), SyncError> {
    let folders = if ctx.folder_publish() {
        snapshot.repository_folders.clone()
    } else {
        FolderMap::new()
    };
    snapshot.repository_items = scan_repository(
        ctx.repository_root(),
        &folders,
        &snapshot.deployed_items,
        &ctx.scan_options(),
    )?;
    Ok(())
}

/// Full path of every folder. A server-supplied `path` wins; otherwise the
/// path is assembled from the parent chain.
fn folder_paths(folders: &[RemoteFolder]) -> FolderMap {
    let by_id: BTreeMap<&str, &RemoteFolder> = folders.iter().map(|f| (f.id.as_str(), f)).collect();
    let mut paths = FolderMap::new();
    for folder in folders {
        if let Some(path) = folder.path.as_deref().map(normalize_folder_path) {
            if !path.is_empty() {
                paths.insert(path, folder.id.clone());
                continue;
            }
        }
        match path_from_parents(folder, &by_id) {
            Some(path) => {
                paths.insert(path, folder.id.clone());
            }
            None => warn!(
                "folder '{}' ({}) has a broken parent chain, ignoring",
                folder.display_name, folder.id
            ),
        }
    }
    paths
}

fn path_from_parents(folder: &RemoteFolder, by_id: &BTreeMap<&str, &RemoteFolder>) -> Option<String> {
    let mut segments = vec![folder.display_name.as_str()];
    let mut seen = HashSet::from([folder.id.as_str()]);
    let mut parent = folder.parent_folder_id.as_deref();
    while let Some(parent_id) = parent.filter(|p| !p.is_empty()) {
        if !seen.insert(parent_id) {
            return None;
        }
        let next = by_id.get(parent_id)?;
        segments.push(next.display_name.as_str());
        parent = next.parent_folder_id.as_deref();
    }
    segments.reverse();
    Some(segments.join("/"))
}
