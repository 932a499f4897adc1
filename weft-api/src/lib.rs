//! weft-api: talking to the remote workspace.
//!
//! - [`token`] / [`credential`]: bearer token cache and credential sources
//! - [`invoker`]: one logical request per call, with token refresh,
//!   long-running-operation polling and 429 backoff
//! - [`transport`] / [`backoff`]: the physical send and sleep seams
//! - [`endpoints`]: typed workspace operations ([`WorkspaceClient`])

pub mod backoff;
pub mod credential;
pub mod endpoints;
pub mod error;
pub mod invoker;
pub mod token;
pub mod transport;

pub use backoff::{Sleeper, TokioSleeper};
pub use credential::{credential_from_env, ClientSecretCredential, StaticTokenCredential};
pub use endpoints::{
    list_workspaces, resolve_workspace_id, FabricClient, RemoteFolder, RemoteItem,
    WorkspaceClient, WorkspaceSummary,
};
pub use error::ApiError;
pub use invoker::{ApiResponse, Invoker};
pub use token::{AccessToken, TokenCache, TokenCredential};
pub use transport::{HttpTransport, RawResponse, ReqwestTransport, RequestBody};
