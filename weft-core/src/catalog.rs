//! Fixed per-type publish rules and well-known repository file names.

use crate::types::ItemType;

/// Marker file that turns a directory into an item boundary.
pub const MARKER_FILE: &str = ".platform";

/// Folder manifest at the repository root: `[{ "path": ..., "id": ... }]`.
pub const FOLDER_MANIFEST: &str = ".workspace_folders.json";

/// Default parameter file name at the repository root.
pub const PARAMETER_FILE: &str = "parameter.yml";

/// Default management API root.
pub const DEFAULT_API_ROOT: &str = "https://api.fabric.microsoft.com";

/// Retry budget for item types without an override.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Orphan deletion order: downstream consumers before the items they depend on.
pub const UNPUBLISH_ORDER: [ItemType; 18] = [
    ItemType::DataPipeline,
    ItemType::Dataflow,
    ItemType::Eventstream,
    ItemType::Reflex,
    ItemType::KqlDashboard,
    ItemType::KqlQueryset,
    ItemType::KqlDatabase,
    ItemType::Eventhouse,
    ItemType::CopyJob,
    ItemType::Report,
    ItemType::SemanticModel,
    ItemType::Notebook,
    ItemType::Environment,
    ItemType::MirroredDatabase,
    ItemType::SqlDatabase,
    ItemType::Lakehouse,
    ItemType::Warehouse,
    ItemType::VariableLibrary,
];

impl ItemType {
    /// Types whose remote representation has no file-based definition.
    pub fn is_shell_only(&self) -> bool {
        matches!(
            self,
            ItemType::Environment
                | ItemType::Lakehouse
                | ItemType::Warehouse
                | ItemType::SqlDatabase
        )
    }

    /// Per-type 429 retry budget.
    pub fn max_retries(&self) -> u32 {
        match self {
            ItemType::SemanticModel
            | ItemType::Report
            | ItemType::Eventstream
            | ItemType::KqlDatabase
            | ItemType::SqlDatabase
            | ItemType::Warehouse
            | ItemType::Dataflow => 10,
            ItemType::VariableLibrary => 7,
            _ => DEFAULT_MAX_RETRIES,
        }
    }

    /// Types whose deletion destroys data and must be enabled explicitly.
    pub fn requires_unpublish_opt_in(&self) -> bool {
        matches!(
            self,
            ItemType::Lakehouse | ItemType::Warehouse | ItemType::SqlDatabase
        )
    }
}
