use thiserror::Error;

/// Error surface for token acquisition and remote API calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The credential could not produce a bearer token. Never retried.
    #[error("failed to acquire access token: {0}")]
    Auth(String),

    /// 400, 401 (other than token expiry) and 403 responses.
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("unhandled response {status} from {method} {url}: {body}")]
    UnhandledStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("operation is in an undefined state")]
    OperationUndefined,

    #[error("long-running operation at {url} returned no Location header")]
    MissingLocation { url: String },

    #[error("{method} {url} still throttled after {attempts} retries")]
    RetriesExhausted {
        method: String,
        url: String,
        attempts: u32,
    },

    /// A success response lacked a field the caller depends on.
    #[error("response is missing '{field}' ({context})")]
    MissingField { field: String, context: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn missing_field(field: &str, context: impl Into<String>) -> ApiError {
    ApiError::MissingField {
        field: field.to_string(),
        context: context.into(),
    }
}
