//! Subcommands and the workspace setup they share.

pub mod plan;
pub mod publish;
pub mod unpublish;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use weft_api::{
    credential_from_env, resolve_workspace_id, FabricClient, Invoker, ReqwestTransport,
    TokenCache,
};
use weft_core::catalog::PARAMETER_FILE;
use weft_core::validate::{
    compile_regex, validate_item_types, validate_repository_directory, validate_workspace_id,
};
use weft_core::{config, DeployConfig, WorkspaceId};
use weft_sync::SyncContext;

/// Target workspace, repository and deploy settings.
#[derive(Args, Debug, Clone)]
pub struct WorkspaceArgs {
    /// Directory holding the item directories.
    #[arg(long, short = 'r')]
    pub repository_directory: PathBuf,

    /// Target workspace id (GUID).
    #[arg(long, required_unless_present = "workspace_name", conflicts_with = "workspace_name")]
    pub workspace_id: Option<String>,

    /// Target workspace display name, resolved to its id.
    #[arg(long)]
    pub workspace_name: Option<String>,

    /// Environment key used to pick parameter replace values.
    #[arg(long, short = 'e')]
    pub environment: Option<String>,

    /// Item types to include (comma separated). Defaults to every type.
    #[arg(long, value_delimiter = ',')]
    pub item_types: Vec<String>,

    /// Deploy config YAML. Flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Parameter file. Defaults to `parameter.yml` in the repository.
    #[arg(long)]
    pub parameter_file: Option<PathBuf>,

    /// Management API root.
    #[arg(long)]
    pub api_url: Option<String>,

    /// Leave workspace folders alone.
    #[arg(long)]
    pub no_folders: bool,
}

impl WorkspaceArgs {
    /// Effective config: file (or defaults) with flags layered on top.
    pub fn deploy_config(&self) -> Result<DeployConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_at(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => DeployConfig::default(),
        };
        if let Some(url) = &self.api_url {
            cfg.base_api_url = url.clone();
        }
        if let Some(env) = &self.environment {
            cfg.environment = Some(env.clone());
        }
        if !self.item_types.is_empty() {
            cfg.item_types_in_scope = validate_item_types(&self.item_types)?;
        }
        if self.no_folders {
            cfg.features.folder_publish = false;
        }
        Ok(cfg)
    }

    /// Validate input, authenticate, resolve the workspace and load parameters.
    pub async fn connect(&self, cfg: DeployConfig, cancel: CancellationToken) -> Result<SyncContext> {
        let repository = validate_repository_directory(&self.repository_directory)?;
        let workspace_id = self
            .workspace_id
            .as_deref()
            .map(validate_workspace_id)
            .transpose()?;

        let credential = credential_from_env().context("authentication is not configured")?;
        let tokens = Arc::new(TokenCache::new(credential));
        let invoker = Arc::new(
            Invoker::new(Arc::new(ReqwestTransport::default()), tokens)
                .with_poll_interval(Duration::from_millis(cfg.poll_interval_ms))
                .with_cancellation(cancel),
        );

        let workspace_id = match (workspace_id, &self.workspace_name) {
            (Some(id), _) => id,
            (None, Some(name)) => lookup_workspace(&invoker, &cfg.base_api_url, name).await?,
            (None, None) => bail!("provide --workspace-id or --workspace-name"),
        };
        tracing::info!("target workspace {workspace_id}");

        let parameter_path = self
            .parameter_file
            .clone()
            .unwrap_or_else(|| repository.join(PARAMETER_FILE));
        let parameters = weft_params::load(&parameter_path, cfg.environment.as_deref())
            .with_context(|| format!("failed to load parameter file {}", parameter_path.display()))?;

        let client = FabricClient::new(invoker, &cfg.base_api_url, workspace_id);
        let ctx = SyncContext::new(Arc::new(client), cfg, repository)?.with_parameters(parameters);
        Ok(ctx)
    }
}

async fn lookup_workspace(invoker: &Invoker, api_root: &str, name: &str) -> Result<WorkspaceId> {
    match resolve_workspace_id(invoker, api_root, name)
        .await
        .with_context(|| format!("failed to list workspaces while resolving '{name}'"))?
    {
        Some(id) => Ok(id),
        None => bail!("no workspace named '{name}' is visible to this identity"),
    }
}

/// Compile an optional item-name regex from a flag.
pub fn name_regex(pattern: Option<&str>, flag: &str) -> Result<Option<Regex>> {
    Ok(pattern.map(|p| compile_regex(p, flag)).transpose()?)
}
