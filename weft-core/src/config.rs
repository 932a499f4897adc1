//! Deploy configuration.
//!
//! Everything that used to be a process-wide switch (folder publish,
//! destructive unpublish per type) is a field on [`DeployConfig`] and is
//! passed explicitly to whoever needs it. The config can be loaded from a
//! YAML file; CLI flags are layered on top by the binary.
//!
//! ```yaml
//! base_api_url: https://api.fabric.microsoft.com
//! environment: PROD
//! item_types_in_scope: [Notebook, DataPipeline]
//! features:
//!   folder_publish: true
//!   lakehouse_unpublish: false
//! exclude_path_regex: "^\\.children/"
//! poll_interval_ms: 1000
//! continue_on_error: false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_API_ROOT;
use crate::error::{io_err, CoreError};
use crate::types::ItemType;

/// Opt-in / opt-out switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureFlags {
    /// Publish and unpublish workspace folders, and move items between them.
    pub folder_publish: bool,
    pub lakehouse_unpublish: bool,
    pub warehouse_unpublish: bool,
    pub sqldatabase_unpublish: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            folder_publish: true,
            lakehouse_unpublish: false,
            warehouse_unpublish: false,
            sqldatabase_unpublish: false,
        }
    }
}

impl FeatureFlags {
    /// Whether orphans of `item_type` may be deleted.
    pub fn unpublish_enabled(&self, item_type: ItemType) -> bool {
        match item_type {
            ItemType::Lakehouse => self.lakehouse_unpublish,
            ItemType::Warehouse => self.warehouse_unpublish,
            ItemType::SqlDatabase => self.sqldatabase_unpublish,
            _ => true,
        }
    }

    /// Opt in to deleting orphans of `item_type`. Returns `false` for types
    /// that never need an opt-in.
    pub fn enable_unpublish(&mut self, item_type: ItemType) -> bool {
        let flag = match item_type {
            ItemType::Lakehouse => &mut self.lakehouse_unpublish,
            ItemType::Warehouse => &mut self.warehouse_unpublish,
            ItemType::SqlDatabase => &mut self.sqldatabase_unpublish,
            _ => return false,
        };
        *flag = true;
        true
    }
}

/// Run-wide deploy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    pub base_api_url: String,
    /// Target environment key used to pick parameter replace values.
    pub environment: Option<String>,
    /// Empty means every catalog type.
    pub item_types_in_scope: Vec<ItemType>,
    pub features: FeatureFlags,
    /// Item-relative file paths matching this regex are left out of
    /// definition payloads.
    pub exclude_path_regex: Option<String>,
    pub poll_interval_ms: u64,
    /// Keep publishing remaining items after one fails.
    pub continue_on_error: bool,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            base_api_url: DEFAULT_API_ROOT.to_string(),
            environment: None,
            item_types_in_scope: Vec::new(),
            features: FeatureFlags::default(),
            exclude_path_regex: None,
            poll_interval_ms: 1_000,
            continue_on_error: false,
        }
    }
}

impl DeployConfig {
    /// Item types in scope, defaulting to the full catalog.
    pub fn scoped_item_types(&self) -> Vec<ItemType> {
        if self.item_types_in_scope.is_empty() {
            ItemType::ALL.to_vec()
        } else {
            self.item_types_in_scope.clone()
        }
    }
}

/// Load a config file. Missing keys take their defaults.
pub fn load_at(path: &Path) -> Result<DeployConfig, CoreError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    if contents.trim().is_empty() {
        return Ok(DeployConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| CoreError::Config {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = DeployConfig::default();
        assert!(cfg.features.folder_publish);
        assert!(!cfg.features.unpublish_enabled(ItemType::Lakehouse));
        assert!(cfg.features.unpublish_enabled(ItemType::Notebook));
        assert_eq!(cfg.scoped_item_types().len(), ItemType::ALL.len());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("weft.yml");
        fs::write(
            &path,
            "environment: PROD\nitem_types_in_scope: [Notebook, KQLDatabase]\nfeatures:\n  lakehouse_unpublish: true\n",
        )
        .unwrap();
        let cfg = load_at(&path).unwrap();
        assert_eq!(cfg.environment.as_deref(), Some("PROD"));
        assert_eq!(
            cfg.item_types_in_scope,
            vec![ItemType::Notebook, ItemType::KqlDatabase]
        );
        assert!(cfg.features.lakehouse_unpublish);
        assert!(cfg.features.folder_publish);
        assert_eq!(cfg.poll_interval_ms, 1_000);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("weft.yml");
        fs::write(&path, "enviroment: PROD\n").unwrap();
        let err = load_at(&path).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }), "got: {err}");
    }

    #[test]
    fn opt_in_applies_only_to_data_stores() {
        let mut flags = FeatureFlags::default();
        assert!(flags.enable_unpublish(ItemType::Warehouse));
        assert!(flags.unpublish_enabled(ItemType::Warehouse));
        assert!(!flags.enable_unpublish(ItemType::Notebook));
        assert!(!flags.unpublish_enabled(ItemType::Lakehouse));
    }
}
