//! Error types for weft-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while validating input or loading the repository.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed caller input (workspace id, repository directory, item types, regex).
    #[error("invalid input: {0}")]
    Input(String),

    /// A marker file, folder manifest or other repository document is malformed.
    #[error("failed to parse {path}: {message}")]
    Parsing { path: PathBuf, message: String },

    /// Underlying I/O failure, annotated with the offending path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Deploy config YAML could not be parsed.
    #[error("failed to parse config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Convenience constructor for [`CoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`CoreError::Parsing`].
pub(crate) fn parse_err(path: impl Into<PathBuf>, message: impl Into<String>) -> CoreError {
    CoreError::Parsing {
        path: path.into(),
        message: message.into(),
    }
}
