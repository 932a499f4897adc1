//! `weft publish` — push every repository item into the workspace.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use weft_sync::{publish_all, PublishAction, PublishReport, WorkspaceSnapshot};

use super::{name_regex, WorkspaceArgs};

/// Arguments for `weft publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Skip items whose display name matches this regex.
    #[arg(long)]
    pub item_name_exclude: Option<String>,

    /// Keep publishing after an item fails; exit non-zero at the end.
    #[arg(long)]
    pub continue_on_error: bool,
}

impl PublishArgs {
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let mut cfg = self.workspace.deploy_config()?;
        if self.continue_on_error {
            cfg.continue_on_error = true;
        }
        let exclude = name_regex(self.item_name_exclude.as_deref(), "item_name_exclude")?;
        let ctx = self
            .workspace
            .connect(cfg, cancel)
            .await?
            .with_item_name_exclude(exclude);

        let mut snapshot = WorkspaceSnapshot::default();
        let report = publish_all(&ctx, &mut snapshot).await?;
        print_summary(&report);
        report.ensure_complete()?;
        Ok(())
    }
}

fn print_summary(report: &PublishReport) {
    for result in &report.results {
        let action = match result.action {
            PublishAction::Create => result.action.as_str().green(),
            PublishAction::UpdateDefinition | PublishAction::PatchMetadata => {
                result.action.as_str().yellow()
            }
            PublishAction::Skip => result.action.as_str().dimmed(),
        };
        let moved = if result.moved { " (moved)" } else { "" };
        println!("{:<16} {:<10} {}{moved}", result.item_type.as_str(), action, result.name);
    }
    for failure in &report.failures {
        println!("{} {failure}", "failed".red().bold());
    }

    let summary = format!(
        "{} created, {} updated, {} skipped, {} folders created",
        report.count(PublishAction::Create),
        report.count(PublishAction::UpdateDefinition) + report.count(PublishAction::PatchMetadata),
        report.count(PublishAction::Skip),
        report.folders_created,
    );
    if report.failures.is_empty() {
        println!("{} {summary}", "Published:".green().bold());
    } else {
        println!(
            "{} {summary}, {} failed",
            "Published with errors:".red().bold(),
            report.failures.len()
        );
    }
}
