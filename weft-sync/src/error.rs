//! Error types for weft-sync.

use thiserror::Error;

use weft_api::ApiError;
use weft_core::{CoreError, ItemType};
use weft_params::ParameterError;

/// All errors that can arise while reconciling a workspace.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Input validation or repository loading failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A remote call failed after the invoker exhausted its recovery.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The parameter file could not be loaded or applied.
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    /// Failure attributed to a single item.
    #[error("{item_type} '{name}': {source}")]
    Item {
        item_type: ItemType,
        name: String,
        #[source]
        source: Box<SyncError>,
    },

    #[error("{item_type} '{name}' is not in the repository snapshot")]
    UnknownItem { item_type: ItemType, name: String },

    #[error("{failed} of {attempted} items failed to publish")]
    Incomplete { failed: usize, attempted: usize },
}

impl SyncError {
    pub(crate) fn for_item(item_type: ItemType, name: &str, source: impl Into<SyncError>) -> Self {
        SyncError::Item {
            item_type,
            name: name.to_string(),
            source: Box::new(source.into()),
        }
    }
}
