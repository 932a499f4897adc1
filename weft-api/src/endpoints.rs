//! Typed workspace endpoints on top of the [`Invoker`].
//!
//! [`WorkspaceClient`] is the seam the reconciliation engine talks through;
//! [`FabricClient`] is the HTTP implementation.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use weft_core::catalog::DEFAULT_MAX_RETRIES;
use weft_core::WorkspaceId;

use crate::error::{missing_field, ApiError};
use crate::invoker::{ApiResponse, Invoker};
use crate::transport::RequestBody;

/// An item as listed by the remote workspace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    pub display_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
}

/// A folder as listed by the remote workspace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFolder {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    /// Some API versions return the full path directly.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub id: String,
    pub display_name: String,
}

/// Every remote operation the reconciler needs.
#[async_trait]
pub trait WorkspaceClient: Send + Sync {
    fn workspace_id(&self) -> &WorkspaceId;

    async fn list_items(&self) -> Result<Vec<RemoteItem>, ApiError>;

    /// SQL endpoint connection string of a lakehouse, when provisioned.
    async fn lakehouse_sql_endpoint(&self, lakehouse_id: &str) -> Result<Option<String>, ApiError>;

    /// Create an item and return its id.
    async fn create_item(&self, body: Value, max_retries: u32) -> Result<String, ApiError>;

    async fn update_definition(
        &self,
        item_id: &str,
        body: Value,
        max_retries: u32,
    ) -> Result<(), ApiError>;

    async fn patch_item(&self, item_id: &str, body: Value, max_retries: u32)
        -> Result<(), ApiError>;

    async fn move_item(
        &self,
        item_id: &str,
        target_folder_id: &str,
        max_retries: u32,
    ) -> Result<(), ApiError>;

    async fn delete_item(&self, item_id: &str) -> Result<(), ApiError>;

    /// Stage Spark compute settings on an environment.
    async fn update_spark_compute(
        &self,
        environment_id: &str,
        settings: Value,
        max_retries: u32,
    ) -> Result<(), ApiError>;

    /// Publish an environment's staged settings.
    async fn publish_environment(&self, environment_id: &str, max_retries: u32)
        -> Result<(), ApiError>;

    async fn list_folders(&self) -> Result<Vec<RemoteFolder>, ApiError>;

    /// Create a folder and return its id. `None` parent means the workspace root.
    async fn create_folder(
        &self,
        display_name: &str,
        parent_folder_id: Option<&str>,
    ) -> Result<String, ApiError>;

    async fn delete_folder(&self, folder_id: &str) -> Result<(), ApiError>;
}

/// HTTP implementation scoped to one workspace.
pub struct FabricClient {
    invoker: Arc<Invoker>,
    workspace_id: WorkspaceId,
    base_url: String,
}

impl FabricClient {
    /// `api_root` is the host root, e.g. `https://api.fabric.microsoft.com`.
    pub fn new(invoker: Arc<Invoker>, api_root: &str, workspace_id: WorkspaceId) -> Self {
        let base_url = format!(
            "{}/v1/workspaces/{}",
            api_root.trim_end_matches('/'),
            workspace_id
        );
        Self {
            invoker,
            workspace_id,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, url: &str) -> Result<ApiResponse, ApiError> {
        self.invoker
            .invoke(Method::GET, url, RequestBody::Empty, DEFAULT_MAX_RETRIES)
            .await
    }

    async fn list_paged<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, ApiError> {
        list_paged(&self.invoker, url).await
    }
}

/// Follow `continuationUri` until the listing is exhausted.
async fn list_paged<T: serde::de::DeserializeOwned>(
    invoker: &Invoker,
    url: &str,
) -> Result<Vec<T>, ApiError> {
    let mut out = Vec::new();
    let mut next = Some(url.to_string());
    while let Some(page_url) = next.take() {
        let response = invoker
            .invoke(Method::GET, &page_url, RequestBody::Empty, DEFAULT_MAX_RETRIES)
            .await?;
        let body = response
            .body
            .ok_or_else(|| missing_field("value", format!("GET {page_url}")))?;
        let values = body
            .get("value")
            .cloned()
            .ok_or_else(|| missing_field("value", format!("GET {page_url}")))?;
        let page: Vec<T> = serde_json::from_value(values)?;
        out.extend(page);
        next = body
            .get("continuationUri")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        if next.is_some() {
            debug!("following continuation of {url}");
        }
    }
    Ok(out)
}

/// List every workspace the caller can see.
pub async fn list_workspaces(
    invoker: &Invoker,
    api_root: &str,
) -> Result<Vec<WorkspaceSummary>, ApiError> {
    let url = format!("{}/v1/workspaces", api_root.trim_end_matches('/'));
    list_paged(invoker, &url).await
}

/// Resolve a workspace display name to its id. `Ok(None)` when no workspace
/// carries that name.
pub async fn resolve_workspace_id(
    invoker: &Invoker,
    api_root: &str,
    workspace_name: &str,
) -> Result<Option<WorkspaceId>, ApiError> {
    let workspaces = list_workspaces(invoker, api_root).await?;
    Ok(workspaces
        .into_iter()
        .find(|w| w.display_name == workspace_name)
        .map(|w| WorkspaceId(w.id)))
}

#[async_trait]
impl WorkspaceClient for FabricClient {
    fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    async fn list_items(&self) -> Result<Vec<RemoteItem>, ApiError> {
        self.list_paged(&format!("{}/items", self.base_url)).await
    }

    async fn lakehouse_sql_endpoint(&self, lakehouse_id: &str) -> Result<Option<String>, ApiError> {
        let response = self
            .get(&format!("{}/lakehouses/{lakehouse_id}", self.base_url))
            .await?;
        Ok(response
            .body
            .as_ref()
            .and_then(|b| b.pointer("/properties/sqlEndpointProperties/connectionString"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }

    async fn create_item(&self, body: Value, max_retries: u32) -> Result<String, ApiError> {
        let url = format!("{}/items", self.base_url);
        let response = self
            .invoker
            .invoke(Method::POST, &url, RequestBody::Json(body), max_retries)
            .await?;
        response
            .str_field("id")
            .map(str::to_string)
            .ok_or_else(|| missing_field("id", format!("POST {url}")))
    }

    async fn update_definition(
        &self,
        item_id: &str,
        body: Value,
        max_retries: u32,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/items/{item_id}/updateDefinition?updateMetadata=True",
            self.base_url
        );
        self.invoker
            .invoke(Method::POST, &url, RequestBody::Json(body), max_retries)
            .await?;
        Ok(())
    }

    async fn patch_item(
        &self,
        item_id: &str,
        body: Value,
        max_retries: u32,
    ) -> Result<(), ApiError> {
        let url = format!("{}/items/{item_id}", self.base_url);
        self.invoker
            .invoke(Method::PATCH, &url, RequestBody::Json(body), max_retries)
            .await?;
        Ok(())
    }

    async fn move_item(
        &self,
        item_id: &str,
        target_folder_id: &str,
        max_retries: u32,
    ) -> Result<(), ApiError> {
        let url = format!("{}/items/{item_id}/move", self.base_url);
        // An empty target moves the item back to the workspace root.
        let target = if target_folder_id.is_empty() {
            Value::Null
        } else {
            Value::String(target_folder_id.to_string())
        };
        let body = json!({ "targetFolderId": target });
        self.invoker
            .invoke(Method::POST, &url, RequestBody::Json(body), max_retries)
            .await?;
        Ok(())
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/items/{item_id}", self.base_url);
        self.invoker
            .invoke(Method::DELETE, &url, RequestBody::Empty, DEFAULT_MAX_RETRIES)
            .await?;
        Ok(())
    }

    async fn update_spark_compute(
        &self,
        environment_id: &str,
        settings: Value,
        max_retries: u32,
    ) -> Result<(), ApiError> {
        let url = format!(
            "{}/environments/{environment_id}/staging/sparkcompute",
            self.base_url
        );
        self.invoker
            .invoke(Method::PATCH, &url, RequestBody::Json(settings), max_retries)
            .await?;
        Ok(())
    }

    async fn publish_environment(
        &self,
        environment_id: &str,
        max_retries: u32,
    ) -> Result<(), ApiError> {
        let url = format!("{}/environments/{environment_id}/staging/publish", self.base_url);
        self.invoker
            .invoke(Method::POST, &url, RequestBody::Empty, max_retries)
            .await?;
        debug!("published staged settings of environment {environment_id}");
        Ok(())
    }

    async fn list_folders(&self) -> Result<Vec<RemoteFolder>, ApiError> {
        self.list_paged(&format!("{}/folders", self.base_url)).await
    }

    async fn create_folder(
        &self,
        display_name: &str,
        parent_folder_id: Option<&str>,
    ) -> Result<String, ApiError> {
        let url = format!("{}/folders", self.base_url);
        let mut body = json!({ "displayName": display_name });
        if let Some(parent) = parent_folder_id {
            body["parentFolderId"] = Value::String(parent.to_string());
        }
        let response = self
            .invoker
            .invoke(Method::POST, &url, RequestBody::Json(body), DEFAULT_MAX_RETRIES)
            .await?;
        response
            .str_field("id")
            .map(str::to_string)
            .ok_or_else(|| missing_field("id", format!("POST {url}")))
    }

    async fn delete_folder(&self, folder_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/folders/{folder_id}", self.base_url);
        self.invoker
            .invoke(Method::DELETE, &url, RequestBody::Empty, DEFAULT_MAX_RETRIES)
            .await?;
        Ok(())
    }
}
