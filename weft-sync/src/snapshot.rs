//! Run-scoped state: the two sides being reconciled and the settings that
//! drive the reconciliation.
//!
//! ## Snapshot layout
//!
//! ```text
//! repository_items   ItemType → name → Item      (scanner)
//! deployed_items     ItemType → name → Item      (list items)
//! repository_folders path → id                   (folder manifest, rebound on publish)
//! deployed_folders   path → id                   (list folders)
//! workspace_items    ItemType → name → {id, sqlendpoint}
//! ```
//!
//! Every map is replaced wholesale by its refresh function in [`crate::fetch`];
//! nothing is merged across refreshes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use weft_api::WorkspaceClient;
use weft_core::validate::compile_regex;
use weft_core::{DeployConfig, FolderMap, Item, ItemMap, ItemType, ScanOptions};
use weft_params::{EnvironmentParameter, WorkspaceItems};

use crate::error::SyncError;

// ---------------------------------------------------------------------------
// WorkspaceSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct WorkspaceSnapshot {
    pub repository_items: ItemMap,
    pub deployed_items: ItemMap,
    pub repository_folders: FolderMap,
    pub deployed_folders: FolderMap,
    pub workspace_items: WorkspaceItems,
}

impl WorkspaceSnapshot {
    pub fn repository_item(&self, item_type: ItemType, name: &str) -> Option<&Item> {
        self.repository_items.get(&item_type)?.get(name)
    }

    pub fn repository_item_mut(&mut self, item_type: ItemType, name: &str) -> Option<&mut Item> {
        self.repository_items.get_mut(&item_type)?.get_mut(name)
    }

    pub fn deployed_item(&self, item_type: ItemType, name: &str) -> Option<&Item> {
        self.deployed_items.get(&item_type)?.get(name)
    }

    /// Repository item names of one type, in publish order.
    pub fn repository_names(&self, item_type: ItemType) -> Vec<String> {
        self.repository_items
            .get(&item_type)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// SyncContext
// ---------------------------------------------------------------------------

/// Everything that stays fixed for the length of one run.
pub struct SyncContext {
    pub client: Arc<dyn WorkspaceClient>,
    pub config: DeployConfig,
    pub repository_root: PathBuf,
    pub parameters: Option<EnvironmentParameter>,
    /// Items whose names match are neither published nor unpublished.
    pub item_name_exclude: Option<Regex>,
    path_exclude: Option<Regex>,
}

impl SyncContext {
    pub fn new(
        client: Arc<dyn WorkspaceClient>,
        config: DeployConfig,
        repository_root: impl Into<PathBuf>,
    ) -> Result<Self, SyncError> {
        let path_exclude = config
            .exclude_path_regex
            .as_deref()
            .map(|p| compile_regex(p, "exclude_path"))
            .transpose()?;
        Ok(Self {
            client,
            config,
            repository_root: repository_root.into(),
            parameters: None,
            item_name_exclude: None,
            path_exclude,
        })
    }

    pub fn with_parameters(mut self, parameters: Option<EnvironmentParameter>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_item_name_exclude(mut self, exclude: Option<Regex>) -> Self {
        self.item_name_exclude = exclude;
        self
    }

    pub fn workspace_id(&self) -> &str {
        &self.client.workspace_id().0
    }

    pub fn repository_root(&self) -> &Path {
        &self.repository_root
    }

    pub fn folder_publish(&self) -> bool {
        self.config.features.folder_publish
    }

    pub fn in_scope(&self, item_type: ItemType) -> bool {
        self.config.item_types_in_scope.is_empty()
            || self.config.item_types_in_scope.contains(&item_type)
    }

    pub fn name_excluded(&self, name: &str) -> bool {
        self.item_name_exclude
            .as_ref()
            .is_some_and(|re| re.is_match(name))
    }

    /// Whether an item-relative file path is left out of definition payloads.
    pub fn path_excluded(&self, relative_path: &str) -> bool {
        self.path_exclude
            .as_ref()
            .is_some_and(|re| re.is_match(relative_path))
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            item_types: self.config.scoped_item_types(),
            folder_publish: self.folder_publish(),
        }
    }
}
