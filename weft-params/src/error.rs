use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or applying a parameter file.
///
/// A parameter file that exists but fails to load terminates the run; nothing
/// from it is ever partially applied.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid parameter file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid parameter file {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("environment variable '{0}' referenced by the parameter file is not set")]
    MissingEnvVar(String),

    #[error("invalid replace value '{value}': {message}")]
    ReplaceValue { value: String, message: String },

    #[error("{item_type} '{name}' is not deployed in the target workspace")]
    UnresolvedItem { item_type: String, name: String },

    #[error("lakehouse '{0}' has no SQL endpoint")]
    MissingSqlEndpoint(String),

    #[error("regex '{pattern}' {message}")]
    RegexMatch { pattern: String, message: String },

    #[error("invalid file_path pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ParameterError {
    ParameterError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> ParameterError {
    ParameterError::Invalid {
        path: path.into(),
        message: message.into(),
    }
}
