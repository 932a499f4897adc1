//! `weft unpublish` — delete workspace items the repository no longer has.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use weft_core::ItemType;
use weft_sync::{unpublish_all_orphans, UnpublishReport, WorkspaceSnapshot};

use super::{name_regex, WorkspaceArgs};

/// Arguments for `weft unpublish`.
#[derive(Args, Debug)]
pub struct UnpublishArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Keep deployed items whose display name matches this regex.
    #[arg(long)]
    pub exclude_regex: Option<String>,

    /// Allow deleting orphans of a data-holding type (Lakehouse, Warehouse,
    /// SQLDatabase). Repeatable.
    #[arg(long = "enable-destructive", value_name = "ITEM_TYPE")]
    pub destructive: Vec<ItemType>,
}

impl UnpublishArgs {
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let mut cfg = self.workspace.deploy_config()?;
        for item_type in &self.destructive {
            if !cfg.features.enable_unpublish(*item_type) {
                bail!("{item_type} orphans are always unpublished; --enable-destructive only applies to data stores");
            }
        }
        let exclude = name_regex(self.exclude_regex.as_deref(), "exclude_regex")?;
        let ctx = self.workspace.connect(cfg, cancel).await?;

        let mut snapshot = WorkspaceSnapshot::default();
        let report = unpublish_all_orphans(&ctx, &mut snapshot, exclude.as_ref()).await?;
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &UnpublishReport) {
    for (item_type, name) in &report.deleted {
        println!("{:<16} {:<10} {name}", item_type.as_str(), "deleted".green());
    }
    for (item_type, name) in &report.failed {
        println!("{:<16} {:<10} {name}", item_type.as_str(), "failed".red());
    }
    for path in &report.folders.deleted {
        println!("{:<16} {:<10} {path}", "Folder", "deleted".green());
    }
    for path in &report.folders.failed {
        println!("{:<16} {:<10} {path}", "Folder", "failed".red());
    }

    let failed = report.failed.len() + report.folders.failed.len();
    let summary = format!(
        "{} items and {} folders deleted",
        report.deleted.len(),
        report.folders.deleted.len()
    );
    if failed == 0 {
        println!("{} {summary}", "Unpublished:".green().bold());
    } else {
        println!(
            "{} {summary}, {failed} could not be deleted",
            "Unpublished with warnings:".yellow().bold()
        );
    }
}
