//! weft — sync a directory of workspace items to a remote workspace.
//!
//! # Usage
//!
//! ```text
//! weft publish   -r <dir> (--workspace-id <guid> | --workspace-name <name>) [--environment <env>]
//! weft unpublish -r <dir> (--workspace-id <guid> | --workspace-name <name>) [--exclude-regex <re>]
//! weft plan      -r <dir> (--workspace-id <guid> | --workspace-name <name>) [--json]
//! ```
//!
//! Credentials come from `WEFT_ACCESS_TOKEN`, or from `WEFT_TENANT_ID`,
//! `WEFT_CLIENT_ID` and `WEFT_CLIENT_SECRET`.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use commands::{plan::PlanArgs, publish::PublishArgs, unpublish::UnpublishArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "weft",
    version,
    about = "Publish a repository of workspace items to a remote workspace",
    long_about = None,
)]
struct Cli {
    /// Log remote calls and substitution detail.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create, update and move every repository item in the workspace.
    Publish(PublishArgs),

    /// Delete workspace items and folders the repository no longer has.
    Unpublish(UnpublishArgs),

    /// Show what publish and unpublish would do, without changing anything.
    Plan(PlanArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        spawn_interrupt_handler(cancel.clone());
        match cli.command {
            Commands::Publish(args) => args.run(cancel).await,
            Commands::Unpublish(args) => args.run(cancel).await,
            Commands::Plan(args) => args.run(cancel).await,
        }
    })
}

fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// First Ctrl-C stops the run before its next remote call.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current request");
            cancel.cancel();
        }
    });
}
