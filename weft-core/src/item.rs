//! [`Item`] — one deployable unit of workspace content.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{io_err, CoreError};
use crate::file::FileItem;
use crate::types::ItemType;

/// Items keyed by type, then by display name.
pub type ItemMap = BTreeMap<ItemType, BTreeMap<String, Item>>;

/// A repository-side or deployed-side item.
///
/// `item_type`, `name` and `description` are fixed at construction and only
/// readable afterwards. Remote identity (`guid`), placement (`folder_id`) and
/// the derived `skip_publish` flag are ordinary mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    item_type: ItemType,
    name: String,
    description: String,
    pub guid: String,
    pub logical_id: String,
    pub folder_id: String,
    pub path: PathBuf,
    pub files: Vec<FileItem>,
    pub skip_publish: bool,
}

impl Item {
    pub fn new(item_type: ItemType, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            item_type,
            name: name.into(),
            description: description.into(),
            guid: String::new(),
            logical_id: String::new(),
            folder_id: String::new(),
            path: PathBuf::new(),
            files: Vec::new(),
            skip_publish: false,
        }
    }

    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = guid.into();
        self
    }

    pub fn with_logical_id(mut self, logical_id: impl Into<String>) -> Self {
        self.logical_id = logical_id.into();
        self
    }

    pub fn with_folder_id(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = folder_id.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_files(mut self, files: Vec<FileItem>) -> Self {
        self.files = files;
        self
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// True once the item has a remote identity.
    pub fn is_deployed(&self) -> bool {
        !self.guid.is_empty()
    }

    /// Load every file under [`Item::path`] (recursively, sorted by path).
    pub fn collect_files(&mut self) -> Result<(), CoreError> {
        self.files = collect_files_under(&self.path)?;
        Ok(())
    }

    /// Set `key` to `value` in every JSON file body. Returns the number of
    /// values that changed across all files.
    pub fn replace_in_body(&mut self, key: &str, value: &str) -> usize {
        self.files
            .iter_mut()
            .map(|f| f.replace_json_key(key, value))
            .sum()
    }
}

fn collect_files_under(root: &Path) -> Result<Vec<FileItem>, CoreError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            io_err(path, e.into())
        })?;
        if entry.file_type().is_file() {
            files.push(FileItem::load(root, entry.path())?);
        }
    }
    Ok(files)
}
