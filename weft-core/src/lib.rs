//! weft core library: the item model, repository scanning, input validation
//! and deploy configuration.
//!
//! - [`types`] / [`catalog`]: the closed item-type catalog and per-type rules
//! - [`item`] / [`file`]: repository and deployed items and their files
//! - [`scanner`] / [`folders`]: build the repository-side snapshot
//! - [`validate`]: caller input checks
//! - [`config`]: [`DeployConfig`] and [`FeatureFlags`]
//! - [`error`]: [`CoreError`]

pub mod catalog;
pub mod config;
pub mod error;
pub mod file;
pub mod folders;
pub mod item;
pub mod scanner;
pub mod types;
pub mod validate;

pub use config::{DeployConfig, FeatureFlags};
pub use error::CoreError;
pub use file::{DefinitionPart, FileContents, FileItem, FileKind};
pub use folders::FolderMap;
pub use item::{Item, ItemMap};
pub use scanner::{scan_repository, ScanOptions};
pub use types::{ItemType, WorkspaceId};
