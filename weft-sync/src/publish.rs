//! Publishing a single repository item.
//!
//! ## Steps
//!
//! 1. Name matches the exclude regex → `skip_publish`, no remote call.
//! 2. Substitute on a copy of the item: `logicalId` keys, `workspaceId`
//!    keys, then parameter rules for the target environment.
//! 3. Build the metadata body (`displayName`, `type`, `description`) and,
//!    unless the type is shell-only, the `definition.parts` body.
//! 4. No guid → create (with `folderId`); guid and a definition → update
//!    definition; guid and shell-only → patch metadata without `type`.
//! 5. Environment with `Setting/Sparkcompute.yml` → stage the compute
//!    settings, then publish them.
//! 6. Already deployed in a different folder → move.
//!
//! The repository snapshot keeps the unsubstituted files; only the guid
//! assigned by a create is written back.

use serde_json::{json, Map, Value};
use tracing::{debug, info};
use weft_core::{FileItem, Item, ItemType};
use weft_params::{apply_parameters, ApplyContext, ResolveContext};

use crate::environment::compute_settings;
use crate::error::SyncError;
use crate::snapshot::{SyncContext, WorkspaceSnapshot};

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// What publishing an item does remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishAction {
    Create,
    UpdateDefinition,
    PatchMetadata,
    Skip,
}

impl PublishAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishAction::Create => "create",
            PublishAction::UpdateDefinition => "update definition",
            PublishAction::PatchMetadata => "patch metadata",
            PublishAction::Skip => "skip",
        }
    }
}

impl std::fmt::Display for PublishAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`publish_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub item_type: ItemType,
    pub name: String,
    pub action: PublishAction,
    /// The item was moved to its repository folder.
    pub moved: bool,
    /// Remote id after publish; empty for skipped items never deployed.
    pub guid: String,
}

pub(crate) fn decide_action(ctx: &SyncContext, item: &Item) -> PublishAction {
    if ctx.name_excluded(item.name()) {
        PublishAction::Skip
    } else if !item.is_deployed() {
        PublishAction::Create
    } else if item.item_type().is_shell_only() {
        PublishAction::PatchMetadata
    } else {
        PublishAction::UpdateDefinition
    }
}

/// Folder an already deployed item must move to, if it sits elsewhere.
/// An empty target is the workspace root.
pub(crate) fn move_target(
    ctx: &SyncContext,
    snapshot: &WorkspaceSnapshot,
    item: &Item,
) -> Option<String> {
    if !ctx.folder_publish() || !item.is_deployed() {
        return None;
    }
    let deployed = snapshot.deployed_item(item.item_type(), item.name())?;
    (deployed.folder_id != item.folder_id).then(|| item.folder_id.clone())
}

// ---------------------------------------------------------------------------
// publish_item
// ---------------------------------------------------------------------------

/// Publish the repository item `(item_type, name)`.
///
/// Any failure is reported as [`SyncError::Item`] naming the item.
pub async fn publish_item(
    ctx: &SyncContext,
    snapshot: &mut WorkspaceSnapshot,
    item_type: ItemType,
    name: &str,
) -> Result<PublishResult, SyncError> {
    let mut item = snapshot
        .repository_item(item_type, name)
        .cloned()
        .ok_or_else(|| SyncError::UnknownItem {
            item_type,
            name: name.to_string(),
        })?;

    let action = decide_action(ctx, &item);
    if action == PublishAction::Skip {
        info!("Skipping publishing of {item_type} '{name}' due to exclusion regex");
        if let Some(source) = snapshot.repository_item_mut(item_type, name) {
            source.skip_publish = true;
        }
        return Ok(PublishResult {
            item_type,
            name: name.to_string(),
            action,
            moved: false,
            guid: item.guid,
        });
    }

    info!("Publishing {item_type} '{name}'");
    let target_folder = move_target(ctx, snapshot, &item);
    let guid = publish_remote(ctx, snapshot, &mut item, action, target_folder.as_deref())
        .await
        .map_err(|e| SyncError::for_item(item_type, name, e))?;

    if action == PublishAction::Create {
        if let Some(source) = snapshot.repository_item_mut(item_type, name) {
            source.guid = guid.clone();
        }
    }
    info!("    Published");
    Ok(PublishResult {
        item_type,
        name: name.to_string(),
        action,
        moved: target_folder.is_some(),
        guid,
    })
}

async fn publish_remote(
    ctx: &SyncContext,
    snapshot: &WorkspaceSnapshot,
    item: &mut Item,
    action: PublishAction,
    target_folder: Option<&str>,
) -> Result<String, SyncError> {
    substitute(ctx, snapshot, item)?;

    let item_type = item.item_type();
    let max_retries = item_type.max_retries();
    let guid = match action {
        PublishAction::Create => {
            let mut body = metadata_body(item);
            if !item_type.is_shell_only() {
                body.insert("definition".into(), definition(ctx, item));
            }
            if !item.folder_id.is_empty() {
                body.insert("folderId".into(), Value::String(item.folder_id.clone()));
            }
            let guid = ctx.client.create_item(Value::Object(body), max_retries).await?;
            debug!("created {item_type} '{}' with id {guid}", item.name());
            guid
        }
        PublishAction::UpdateDefinition => {
            let body = json!({ "definition": definition(ctx, item) });
            ctx.client
                .update_definition(&item.guid, body, max_retries)
                .await?;
            item.guid.clone()
        }
        PublishAction::PatchMetadata => {
            let mut body = metadata_body(item);
            body.remove("type");
            ctx.client
                .patch_item(&item.guid, Value::Object(body), max_retries)
                .await?;
            item.guid.clone()
        }
        PublishAction::Skip => return Ok(item.guid.clone()),
    };

    if item_type == ItemType::Environment {
        if let Some(settings) = compute_settings(ctx, item)? {
            ctx.client
                .update_spark_compute(&guid, settings, max_retries)
                .await?;
            ctx.client.publish_environment(&guid, max_retries).await?;
            debug!("staged and published compute settings of {guid}");
        }
    }

    if let Some(target) = target_folder {
        ctx.client.move_item(&guid, target, max_retries).await?;
        debug!("moved {guid} to folder '{target}'");
    }
    Ok(guid)
}

/// Identifier and parameter substitution, in that order.
fn substitute(
    ctx: &SyncContext,
    snapshot: &WorkspaceSnapshot,
    item: &mut Item,
) -> Result<(), SyncError> {
    let logical_id = item.logical_id.clone();
    item.replace_in_body("logicalId", &logical_id);
    item.replace_in_body("workspaceId", ctx.workspace_id());

    let Some(params) = ctx.parameters.as_ref() else {
        return Ok(());
    };
    let Some(environment) = ctx.config.environment.as_deref() else {
        debug!("no target environment set, parameter rules not applied");
        return Ok(());
    };
    let apply_ctx = ApplyContext {
        environment,
        repository_root: ctx.repository_root(),
        values: ResolveContext::new(ctx.workspace_id(), &snapshot.workspace_items),
    };
    let changed = apply_parameters(params, item, &apply_ctx)?;
    debug!("parameters changed {changed} file(s) of '{}'", item.name());
    Ok(())
}

fn metadata_body(item: &Item) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("displayName".into(), Value::String(item.name().to_string()));
    body.insert("type".into(), Value::String(item.item_type().as_str().to_string()));
    if !item.description().is_empty() {
        body.insert(
            "description".into(),
            Value::String(item.description().to_string()),
        );
    }
    body
}

/// `{ "parts": [...] }` from every file except the marker and excluded paths.
fn definition(ctx: &SyncContext, item: &Item) -> Value {
    let parts: Vec<_> = item
        .files
        .iter()
        .filter(|f| !f.is_marker() && !ctx.path_excluded(&f.relative_path()))
        .map(FileItem::definition_part)
        .collect();
    json!({ "parts": parts })
}
