//! Domain types shared by every weft crate.
//!
//! The item-type catalog is closed: every item kind the remote workspace
//! accepts has a variant here, and the wire spelling is the one returned by
//! the management API (`"KQLDatabase"`, `"SQLDatabase"`, …).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A validated remote workspace identifier (GUID form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceId(pub String);

impl WorkspaceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Item type catalog
// ---------------------------------------------------------------------------

/// Every deployable item kind.
///
/// Declaration order is the default publish order: upstream dependencies
/// (variable libraries, storage) come before their consumers (notebooks,
/// reports, pipelines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemType {
    VariableLibrary,
    Warehouse,
    Lakehouse,
    #[serde(rename = "SQLDatabase")]
    SqlDatabase,
    MirroredDatabase,
    Environment,
    Notebook,
    SemanticModel,
    Report,
    CopyJob,
    Eventhouse,
    #[serde(rename = "KQLDatabase")]
    KqlDatabase,
    #[serde(rename = "KQLQueryset")]
    KqlQueryset,
    Reflex,
    Eventstream,
    #[serde(rename = "KQLDashboard")]
    KqlDashboard,
    Dataflow,
    DataPipeline,
}

impl ItemType {
    /// All item types, in publish order.
    pub const ALL: [ItemType; 18] = [
        ItemType::VariableLibrary,
        ItemType::Warehouse,
        ItemType::Lakehouse,
        ItemType::SqlDatabase,
        ItemType::MirroredDatabase,
        ItemType::Environment,
        ItemType::Notebook,
        ItemType::SemanticModel,
        ItemType::Report,
        ItemType::CopyJob,
        ItemType::Eventhouse,
        ItemType::KqlDatabase,
        ItemType::KqlQueryset,
        ItemType::Reflex,
        ItemType::Eventstream,
        ItemType::KqlDashboard,
        ItemType::Dataflow,
        ItemType::DataPipeline,
    ];

    /// Wire spelling used by the management API and in marker files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::VariableLibrary => "VariableLibrary",
            ItemType::Warehouse => "Warehouse",
            ItemType::Lakehouse => "Lakehouse",
            ItemType::SqlDatabase => "SQLDatabase",
            ItemType::MirroredDatabase => "MirroredDatabase",
            ItemType::Environment => "Environment",
            ItemType::Notebook => "Notebook",
            ItemType::SemanticModel => "SemanticModel",
            ItemType::Report => "Report",
            ItemType::CopyJob => "CopyJob",
            ItemType::Eventhouse => "Eventhouse",
            ItemType::KqlDatabase => "KQLDatabase",
            ItemType::KqlQueryset => "KQLQueryset",
            ItemType::Reflex => "Reflex",
            ItemType::Eventstream => "Eventstream",
            ItemType::KqlDashboard => "KQLDashboard",
            ItemType::Dataflow => "Dataflow",
            ItemType::DataPipeline => "DataPipeline",
        }
    }

    /// Plural label used in section headers ("Publishing Notebooks").
    pub fn plural_label(&self) -> &'static str {
        match self {
            ItemType::VariableLibrary => "Variable Libraries",
            ItemType::Warehouse => "Warehouses",
            ItemType::Lakehouse => "Lakehouses",
            ItemType::SqlDatabase => "SQL Databases",
            ItemType::MirroredDatabase => "Mirrored Databases",
            ItemType::Environment => "Environments",
            ItemType::Notebook => "Notebooks",
            ItemType::SemanticModel => "Semantic Models",
            ItemType::Report => "Reports",
            ItemType::CopyJob => "Copy Jobs",
            ItemType::Eventhouse => "Eventhouses",
            ItemType::KqlDatabase => "KQL Databases",
            ItemType::KqlQueryset => "KQL Querysets",
            ItemType::Reflex => "Activators",
            ItemType::Eventstream => "Eventstreams",
            ItemType::KqlDashboard => "KQL Dashboards",
            ItemType::Dataflow => "Dataflows",
            ItemType::DataPipeline => "Data Pipelines",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| {
                let accepted: Vec<&str> = ItemType::ALL.iter().map(ItemType::as_str).collect();
                CoreError::Input(format!(
                    "invalid or unsupported item type '{s}'; must be one of {}",
                    accepted.join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
