//! # sg-cli
//!
//! Command-line interface for School Goals.
//!
//! - `sg goal create/list/status/override/delete` — administer student goals
//! - `sg evaluate student <id>` — re-evaluate one student's active goals
//! - `sg evaluate batch` — re-evaluate every goal due for a recheck
//! - `sg serve` — run the batch evaluation on a fixed interval

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sg_goal::ProjectLayout;
use tracing_subscriber::EnvFilter;

/// School Goals CLI — track and auto-evaluate student goals.
#[derive(Parser)]
#[command(name = "sg", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".")]
    project_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage student goals.
    Goal {
        #[command(subcommand)]
        command: commands::goal::GoalCommands,
    },
    /// Run an evaluation pass.
    Evaluate {
        #[command(subcommand)]
        command: commands::evaluate::EvaluateCommands,
    },
    /// Run the batch evaluation periodically until interrupted.
    Serve {
        /// Minutes between batch runs.
        #[arg(long, default_value_t = 60)]
        interval_minutes: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sg_goal=info".parse()?)
                .add_directive("sg=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let layout = ProjectLayout::for_project(&project_root);

    match &cli.command {
        Commands::Goal { command } => commands::goal::execute(command, &layout).await,
        Commands::Evaluate { command } => commands::evaluate::execute(command, &layout).await,
        Commands::Serve { interval_minutes } => {
            commands::serve::execute(&layout, *interval_minutes).await
        }
    }
}
