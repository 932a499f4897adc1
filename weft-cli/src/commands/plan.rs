//! `weft plan` — read-only preview of publish and unpublish.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tokio_util::sync::CancellationToken;
use weft_sync::{plan, Plan, PublishAction, WorkspaceSnapshot};

use super::{name_regex, WorkspaceArgs};

/// Arguments for `weft plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Unpublish exclude regex to apply when listing orphans.
    #[arg(long)]
    pub exclude_regex: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PlanArgs {
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let cfg = self.workspace.deploy_config()?;
        let exclude = name_regex(self.exclude_regex.as_deref(), "exclude_regex")?;
        let ctx = self.workspace.connect(cfg, cancel).await?;

        let mut snapshot = WorkspaceSnapshot::default();
        let plan = plan(&ctx, &mut snapshot, exclude.as_ref()).await?;
        if self.json {
            print_json(&plan)?;
        } else {
            print_table(&plan);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct PlanJson<'a> {
    changes: usize,
    items: Vec<PlannedItemJson<'a>>,
    orphans: Vec<OrphanJson<'a>>,
    folders_to_create: &'a [String],
    folders_to_delete: &'a [String],
}

#[derive(Serialize)]
struct PlannedItemJson<'a> {
    item_type: &'static str,
    name: &'a str,
    action: &'static str,
    move_to: Option<&'a str>,
}

#[derive(Serialize)]
struct OrphanJson<'a> {
    item_type: &'static str,
    name: &'a str,
}

#[derive(Tabled)]
struct PlanTableRow {
    #[tabled(rename = "type")]
    item_type: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "action")]
    action: String,
    #[tabled(rename = "move to")]
    move_to: String,
}

fn print_json(plan: &Plan) -> Result<()> {
    let payload = PlanJson {
        changes: plan.change_count(),
        items: plan
            .items
            .iter()
            .map(|i| PlannedItemJson {
                item_type: i.item_type.as_str(),
                name: &i.name,
                action: i.action.as_str(),
                move_to: i.move_to.as_deref(),
            })
            .collect(),
        orphans: plan
            .orphans
            .iter()
            .map(|(item_type, name)| OrphanJson {
                item_type: item_type.as_str(),
                name,
            })
            .collect(),
        folders_to_create: &plan.folders_to_create,
        folders_to_delete: &plan.folders_to_delete,
    };
    let text = serde_json::to_string_pretty(&payload).context("failed to render plan as JSON")?;
    println!("{text}");
    Ok(())
}

fn print_table(plan: &Plan) {
    if plan.items.is_empty() {
        println!("No repository items in scope.");
    } else {
        let rows: Vec<PlanTableRow> = plan
            .items
            .iter()
            .map(|i| PlanTableRow {
                item_type: i.item_type.as_str().to_string(),
                name: i.name.clone(),
                action: i.action.as_str().to_string(),
                move_to: match i.move_to.as_deref() {
                    None => String::new(),
                    Some("") => "(root)".to_string(),
                    Some(id) => id.to_string(),
                },
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    if !plan.folders_to_create.is_empty() {
        println!("\n{}", "Folders to create:".bold());
        for path in &plan.folders_to_create {
            println!("  {} {path}", "+".green());
        }
    }
    if !plan.orphans.is_empty() {
        println!("\n{}", "Orphans to unpublish:".bold());
        for (item_type, name) in &plan.orphans {
            println!("  {} {item_type} {name}", "-".red());
        }
    }
    if !plan.folders_to_delete.is_empty() {
        println!("\n{}", "Folders to delete:".bold());
        for path in &plan.folders_to_delete {
            println!("  {} {path}", "-".red());
        }
    }

    let writes = plan
        .items
        .iter()
        .filter(|i| i.action != PublishAction::Skip)
        .count();
    println!(
        "\n{} {} changes ({writes} item writes)",
        "Plan:".bold(),
        plan.change_count()
    );
}
