// evaluate.rs — One-shot evaluation passes: per student or batch.

use clap::Subcommand;
use sg_goal::ProjectLayout;

use super::open_engine;

#[derive(Subcommand)]
pub enum EvaluateCommands {
    /// Re-evaluate one student's in-progress and at-risk goals.
    Student {
        /// Student ID.
        id: String,
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Re-evaluate every goal due for a recheck.
    Batch {
        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,
    },
}

pub async fn execute(cmd: &EvaluateCommands, layout: &ProjectLayout) -> anyhow::Result<()> {
    let engine = open_engine(layout)?;

    match cmd {
        EvaluateCommands::Student { id, json } => {
            let summary = engine.evaluate_for_student(id).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Student {}: {} goal(s) evaluated, {} updated.",
                    id, summary.total, summary.updated
                );
            }
        }
        EvaluateCommands::Batch { json } => {
            let summary = engine.run_batch_evaluation().await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Batch: {} goal(s) due, {} updated, {} error(s).",
                    summary.total, summary.updated, summary.errors
                );
            }
        }
    }

    Ok(())
}
