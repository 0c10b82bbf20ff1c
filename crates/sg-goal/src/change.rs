// change.rs — Idempotency gate between evaluation and persistence.
//
// A recomputation is written back only when the metric moved by more than
// the epsilon or the status changed. Anything else refreshes `last_checked`
// and nothing more, so a noisy metric hovering around the same value never
// churns the store or re-notifies.

use chrono::{DateTime, Utc};

use crate::goal::{Goal, GoalStatus};
use crate::progress::Evaluation;
use crate::store::GoalUpdate;

/// A status change observed during one evaluation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: GoalStatus,
    pub to: GoalStatus,
}

/// What the scheduler must do after evaluating a goal.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Nothing material changed; only refresh `last_checked`.
    Unchanged,
    /// Persist `update` atomically; notify if `transition` is set.
    Material {
        update: GoalUpdate,
        transition: Option<StatusTransition>,
    },
}

impl Change {
    pub fn is_material(&self) -> bool {
        matches!(self, Change::Material { .. })
    }
}

/// Compare a fresh evaluation against the goal as it was read at the start
/// of the same evaluation call.
pub fn detect(
    goal: &Goal,
    new_value: f64,
    evaluation: &Evaluation,
    epsilon: f64,
    now: DateTime<Utc>,
) -> Change {
    let value_moved = (new_value - goal.current_value).abs() > epsilon;
    let status_changed = evaluation.status != goal.status;

    if !value_moved && !status_changed {
        return Change::Unchanged;
    }

    let transition = status_changed.then_some(StatusTransition {
        from: goal.status,
        to: evaluation.status,
    });

    Change::Material {
        update: GoalUpdate::evaluated(new_value, evaluation, now),
        transition,
    }
}
