// scheduler.rs — GoalEngine: targeted and batch evaluation entry points.
//
// Both entry points share `evaluate_goal`, which runs one goal through
//   measure → evaluate → detect change → persist → notify
// and reads the goal's prior status once, at the start of the call. A
// transition is therefore observed (and announced) by exactly one call.
//
// Targeted evaluation walks one student's active goals in order. Batch
// evaluation picks up every goal due for a recheck and fans out under a
// semaphore so the metric sources never see more than `max_concurrency`
// reads at once. Failures are isolated per goal.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::change::{self, Change, StatusTransition};
use crate::config::EngineConfig;
use crate::error::GoalError;
use crate::evaluator::{self, Measurement};
use crate::goal::Goal;
use crate::notification::Notifier;
use crate::progress;
use crate::sources::MetricSources;
use crate::store::{GoalFilter, GoalStore, GoalUpdate};

/// What happened to one goal in one evaluation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalOutcome {
    /// Not auto-evaluated (manual or already terminal). Nothing written.
    Skipped,
    /// Checked; only `last_checked` was refreshed.
    Unchanged,
    /// Evaluated fields written back.
    Updated {
        transition: Option<StatusTransition>,
    },
}

impl GoalOutcome {
    pub fn is_update(&self) -> bool {
        matches!(self, GoalOutcome::Updated { .. })
    }
}

/// Result of evaluating one student's goals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub total: usize,
    pub updated: usize,
}

/// Aggregate counts from one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub updated: usize,
    pub errors: usize,
}

/// The goal evaluation engine.
///
/// Cheap to clone: every collaborator is behind an `Arc`.
#[derive(Clone)]
pub struct GoalEngine {
    store: Arc<dyn GoalStore>,
    sources: MetricSources,
    notifier: Arc<Notifier>,
    config: Arc<EngineConfig>,
}

impl GoalEngine {
    pub fn new(
        store: Arc<dyn GoalStore>,
        sources: MetricSources,
        notifier: Notifier,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            sources,
            notifier: Arc::new(notifier),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate a single goal as read from the store.
    ///
    /// Metric read failures return `GoalError::MetricSource` before anything
    /// is written. Persistence failures propagate. Notification failures
    /// are logged inside the notifier and do not affect the result.
    pub async fn evaluate_goal(&self, goal: &Goal) -> Result<GoalOutcome, GoalError> {
        if goal.status.is_terminal() {
            tracing::debug!(goal_id = %goal.id, status = %goal.status, "terminal goal skipped");
            return Ok(GoalOutcome::Skipped);
        }

        let now = Utc::now();
        let current_value = match evaluator::measure(goal, &self.sources, &self.config, now).await? {
            Measurement::Value(value) => value,
            Measurement::NotEvaluable => {
                tracing::debug!(goal_id = %goal.id, goal_type = %goal.goal_type, "not auto-evaluated");
                return Ok(GoalOutcome::Skipped);
            }
        };

        let evaluation = progress::evaluate(goal, current_value, now, &self.config.at_risk);

        match change::detect(goal, current_value, &evaluation, self.config.value_epsilon, now) {
            Change::Unchanged => {
                self.store
                    .update(goal.id, &GoalUpdate::checked(now))
                    .await?;
                tracing::debug!(goal_id = %goal.id, current_value, "no material change");
                Ok(GoalOutcome::Unchanged)
            }
            Change::Material { update, transition } => {
                self.store.update(goal.id, &update).await?;
                tracing::debug!(
                    goal_id = %goal.id,
                    current_value,
                    progress = evaluation.progress,
                    status = %evaluation.status,
                    "goal updated"
                );
                if let Some(t) = transition {
                    tracing::info!(
                        goal_id = %goal.id,
                        student_id = %goal.student_id,
                        "goal status {} -> {}",
                        t.from,
                        t.to
                    );
                    self.notifier.notify_transition(goal, t, &evaluation).await;
                }
                Ok(GoalOutcome::Updated { transition })
            }
        }
    }

    /// Re-evaluate one student's in-progress and at-risk goals, in order.
    ///
    /// Meant to run right after new activity for the student lands. Goals
    /// whose metrics cannot be read are logged and skipped; a persistence
    /// failure aborts and is returned.
    pub async fn evaluate_for_student(
        &self,
        student_id: &str,
    ) -> Result<EvaluationSummary, GoalError> {
        let goals = self
            .store
            .find_many(&GoalFilter::active_for_student(student_id))
            .await?;

        let mut summary = EvaluationSummary {
            total: goals.len(),
            updated: 0,
        };

        for goal in &goals {
            match self.evaluate_goal(goal).await {
                Ok(outcome) => {
                    if outcome.is_update() {
                        summary.updated += 1;
                    }
                }
                Err(e) if e.is_metric_failure() => {
                    tracing::warn!(goal_id = %goal.id, student_id, "skipping goal: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(
            student_id,
            total = summary.total,
            updated = summary.updated,
            "student goals evaluated"
        );
        Ok(summary)
    }

    /// Re-evaluate every goal whose recheck is due.
    ///
    /// Each goal's failure is counted without affecting the others. Only a
    /// failure to list the due goals is returned as an error.
    pub async fn run_batch_evaluation(&self) -> Result<BatchSummary, GoalError> {
        let cutoff = self.config.recheck_cutoff(Utc::now())?;
        let mut goals = self.store.find_due_for_check(cutoff).await?;

        let mut seen = HashSet::new();
        goals.retain(|g| seen.insert(g.id));

        let mut summary = BatchSummary {
            total: goals.len(),
            ..BatchSummary::default()
        };
        tracing::info!(total = summary.total, "batch evaluation started");

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut set = JoinSet::new();
        for goal in goals {
            let engine = self.clone();
            let sem = semaphore.clone();
            set.spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return (
                        goal.id,
                        Err(GoalError::Config("batch semaphore closed".to_string())),
                    );
                };
                let result = engine.evaluate_goal(&goal).await;
                (goal.id, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => {
                    if outcome.is_update() {
                        summary.updated += 1;
                    }
                }
                Ok((goal_id, Err(e))) => {
                    summary.errors += 1;
                    tracing::warn!(%goal_id, "goal evaluation failed: {}", e);
                }
                Err(e) => {
                    summary.errors += 1;
                    tracing::error!("goal evaluation task aborted: {}", e);
                }
            }
        }

        tracing::info!(
            total = summary.total,
            updated = summary.updated,
            errors = summary.errors,
            "batch evaluation finished"
        );
        Ok(summary)
    }
}
