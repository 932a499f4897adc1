//! # weft-sync
//!
//! Reconciliation between a repository of items and a remote workspace.
//!
//! Call [`publish_all`] to create, update and move every in-scope item,
//! [`unpublish_all_orphans`] to delete what the repository no longer has, or
//! [`plan`] to see what either would do without touching the workspace.

pub mod environment;
pub mod error;
pub mod fetch;
pub mod folders;
pub mod pipeline;
pub mod plan;
pub mod publish;
pub mod snapshot;
pub mod unpublish;

#[cfg(test)]
pub(crate) mod testing;

pub use error::SyncError;
pub use folders::FolderReport;
pub use pipeline::{publish_all, PublishReport};
pub use plan::{plan, Plan, PlannedItem};
pub use publish::{publish_item, PublishAction, PublishResult};
pub use snapshot::{SyncContext, WorkspaceSnapshot};
pub use unpublish::{orphans, unpublish_all_orphans, UnpublishReport};
