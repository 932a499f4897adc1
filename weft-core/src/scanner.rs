//! Repository scanner.
//!
//! Walks every directory of the repository in sorted order, hidden ones and
//! item directories included. A directory that directly contains a
//! `.platform` marker is an item; everything below it is loaded as the item's
//! files.

use std::path::Path;

use serde::Deserialize;
use walkdir::WalkDir;

use crate::catalog::MARKER_FILE;
use crate::error::{io_err, parse_err, CoreError};
use crate::folders::FolderMap;
use crate::item::{Item, ItemMap};
use crate::types::ItemType;

/// What to pick up from the repository.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub item_types: Vec<ItemType>,
    /// When false every item's `folder_id` stays empty.
    pub folder_publish: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            item_types: ItemType::ALL.to_vec(),
            folder_publish: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Marker {
    metadata: MarkerMetadata,
    config: MarkerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkerMetadata {
    #[serde(rename = "type")]
    item_type: String,
    display_name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkerConfig {
    logical_id: String,
}

/// Scan `root` for items.
///
/// `folders` maps repository-relative folder paths to folder ids, `deployed`
/// is the current deployed snapshot whose guids are carried forward by
/// `(type, name)`.
pub fn scan_repository(
    root: &Path,
    folders: &FolderMap,
    deployed: &ItemMap,
    options: &ScanOptions,
) -> Result<ItemMap, CoreError> {
    let mut items = ItemMap::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            io_err(path, e.into())
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        let marker_path = dir.join(MARKER_FILE);
        if !marker_path.is_file() {
            continue;
        }

        let marker = read_marker(&marker_path)?;
        let item_type: ItemType = marker
            .metadata
            .item_type
            .parse()
            .map_err(|_| {
                parse_err(
                    &marker_path,
                    format!("unknown item type '{}'", marker.metadata.item_type),
                )
            })?;
        if !options.item_types.contains(&item_type) {
            tracing::debug!(
                "skipping {} '{}': type not in scope",
                item_type,
                marker.metadata.display_name
            );
            continue;
        }

        let name = marker.metadata.display_name;
        let mut item = Item::new(
            item_type,
            name.clone(),
            marker.metadata.description.unwrap_or_default(),
        )
        .with_logical_id(marker.config.logical_id)
        .with_path(dir);
        item.collect_files()?;

        if item.files.iter().all(|f| f.is_marker()) {
            tracing::warn!(
                "directory '{}' contains only a {} marker, skipping",
                dir.display(),
                MARKER_FILE
            );
            continue;
        }

        if options.folder_publish {
            let parent = relative_parent(root, dir);
            if let Some(id) = folders.get(&parent) {
                item.folder_id = id.clone();
            }
        }

        if let Some(existing) = deployed.get(&item_type).and_then(|m| m.get(&name)) {
            item.guid = existing.guid.clone();
        }

        let by_name = items.entry(item_type).or_default();
        if by_name.contains_key(&name) {
            return Err(parse_err(
                &marker_path,
                format!("duplicate {item_type} named '{name}'"),
            ));
        }
        by_name.insert(name, item);
    }

    Ok(items)
}

fn read_marker(path: &Path) -> Result<Marker, CoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|e| parse_err(path, e.to_string()))
}

/// Slash-separated parent path of `dir` relative to `root`; empty at the root.
fn relative_parent(root: &Path, dir: &Path) -> String {
    dir.parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}
