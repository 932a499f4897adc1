//! In-memory [`WorkspaceClient`] that records every call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use weft_api::{ApiError, RemoteFolder, RemoteItem, WorkspaceClient};
use weft_core::WorkspaceId;

pub(crate) const WORKSPACE_ID: &str = "11111111-2222-3333-4444-555555555555";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    ListItems,
    SqlEndpoint(String),
    Create(Value),
    UpdateDefinition(String, Value),
    Patch(String, Value),
    Move(String, String),
    DeleteItem(String),
    SparkCompute(String, Value),
    PublishEnvironment(String),
    ListFolders,
    CreateFolder(String, Option<String>),
    DeleteFolder(String),
}

impl Call {
    pub(crate) fn is_write(&self) -> bool {
        !matches!(self, Call::ListItems | Call::ListFolders | Call::SqlEndpoint(_))
    }
}

#[derive(Default)]
struct State {
    items: Vec<RemoteItem>,
    folders: Vec<RemoteFolder>,
    sql_endpoints: BTreeMap<String, String>,
    failing: BTreeSet<String>,
    calls: Vec<Call>,
    next_id: usize,
}

pub(crate) struct FakeWorkspace {
    workspace_id: WorkspaceId,
    state: Mutex<State>,
}

impl FakeWorkspace {
    pub(crate) fn new() -> Self {
        Self {
            workspace_id: WorkspaceId(WORKSPACE_ID.to_string()),
            state: Mutex::new(State::default()),
        }
    }

    pub(crate) fn with_item(self, item_type: &str, name: &str, id: &str, folder_id: Option<&str>) -> Self {
        self.lock().items.push(RemoteItem {
            id: id.to_string(),
            item_type: item_type.to_string(),
            display_name: name.to_string(),
            description: None,
            folder_id: folder_id.map(str::to_string),
        });
        self
    }

    pub(crate) fn with_folder(self, id: &str, name: &str, parent: Option<&str>) -> Self {
        self.lock().folders.push(RemoteFolder {
            id: id.to_string(),
            display_name: name.to_string(),
            parent_folder_id: parent.map(str::to_string),
            path: None,
        });
        self
    }

    pub(crate) fn with_sql_endpoint(self, lakehouse_id: &str, endpoint: &str) -> Self {
        self.lock()
            .sql_endpoints
            .insert(lakehouse_id.to_string(), endpoint.to_string());
        self
    }

    /// Make every write that targets `key` (an item id, or a display name on
    /// create) fail with a 500.
    pub(crate) fn failing(self, key: &str) -> Self {
        self.lock().failing.insert(key.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub(crate) fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub(crate) fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub(crate) fn item_id(&self, name: &str) -> Option<String> {
        self.lock()
            .items
            .iter()
            .find(|i| i.display_name == name)
            .map(|i| i.id.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake workspace state poisoned")
    }
}

fn server_error(method: &str, target: &str) -> ApiError {
    ApiError::UnhandledStatus {
        method: method.to_string(),
        url: format!("fake://{target}"),
        status: 500,
        body: "injected failure".to_string(),
    }
}

#[async_trait]
impl WorkspaceClient for FakeWorkspace {
    fn workspace_id(&self) -> &WorkspaceId {
        &self.workspace_id
    }

    async fn list_items(&self) -> Result<Vec<RemoteItem>, ApiError> {
        let mut state = self.lock();
        state.calls.push(Call::ListItems);
        Ok(state.items.clone())
    }

    async fn lakehouse_sql_endpoint(&self, lakehouse_id: &str) -> Result<Option<String>, ApiError> {
        let mut state = self.lock();
        state.calls.push(Call::SqlEndpoint(lakehouse_id.to_string()));
        Ok(state.sql_endpoints.get(lakehouse_id).cloned())
    }

    async fn create_item(&self, body: Value, _max_retries: u32) -> Result<String, ApiError> {
        let mut state = self.lock();
        state.calls.push(Call::Create(body.clone()));
        let name = body["displayName"].as_str().unwrap_or_default().to_string();
        if state.failing.contains(&name) {
            return Err(server_error("POST", &name));
        }
        state.next_id += 1;
        let id = format!("item-{}", state.next_id);
        state.items.push(RemoteItem {
            id: id.clone(),
            item_type: body["type"].as_str().unwrap_or_default().to_string(),
            display_name: name,
            description: body["description"].as_str().map(str::to_string),
            folder_id: body["folderId"].as_str().map(str::to_string),
        });
        Ok(id)
    }

    async fn update_definition(&self, item_id: &str, body: Value, _max_retries: u32) -> Result<(), ApiError> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::UpdateDefinition(item_id.to_string(), body));
        if state.failing.contains(item_id) {
            return Err(server_error("POST", item_id));
        }
        Ok(())
    }

    async fn patch_item(&self, item_id: &str, body: Value, _max_retries: u32) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.push(Call::Patch(item_id.to_string(), body));
        if state.failing.contains(item_id) {
            return Err(server_error("PATCH", item_id));
        }
        Ok(())
    }

    async fn move_item(&self, item_id: &str, target_folder_id: &str, _max_retries: u32) -> Result<(), ApiError> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::Move(item_id.to_string(), target_folder_id.to_string()));
        let target = (!target_folder_id.is_empty()).then(|| target_folder_id.to_string());
        if let Some(item) = state.items.iter_mut().find(|i| i.id == item_id) {
            item.folder_id = target;
        }
        Ok(())
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.push(Call::DeleteItem(item_id.to_string()));
        if state.failing.contains(item_id) {
            return Err(server_error("DELETE", item_id));
        }
        state.items.retain(|i| i.id != item_id);
        Ok(())
    }

    async fn update_spark_compute(&self, environment_id: &str, settings: Value, _max_retries: u32) -> Result<(), ApiError> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::SparkCompute(environment_id.to_string(), settings));
        if state.failing.contains(environment_id) {
            return Err(server_error("PATCH", environment_id));
        }
        Ok(())
    }

    async fn publish_environment(&self, environment_id: &str, _max_retries: u32) -> Result<(), ApiError> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::PublishEnvironment(environment_id.to_string()));
        Ok(())
    }

    async fn list_folders(&self) -> Result<Vec<RemoteFolder>, ApiError> {
        let mut state = self.lock();
        state.calls.push(Call::ListFolders);
        Ok(state.folders.clone())
    }

    async fn create_folder(&self, display_name: &str, parent_folder_id: Option<&str>) -> Result<String, ApiError> {
        let mut state = self.lock();
        state.calls.push(Call::CreateFolder(
            display_name.to_string(),
            parent_folder_id.map(str::to_string),
        ));
        state.next_id += 1;
        let id = format!("folder-{}", state.next_id);
        state.folders.push(RemoteFolder {
            id: id.clone(),
            display_name: display_name.to_string(),
            parent_folder_id: parent_folder_id.map(str::to_string),
            path: None,
        });
        Ok(id)
    }

    async fn delete_folder(&self, folder_id: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.push(Call::DeleteFolder(folder_id.to_string()));
        if state.failing.contains(folder_id) {
            return Err(server_error("DELETE", folder_id));
        }
        state.folders.retain(|f| f.id != folder_id);
        Ok(())
    }
}
