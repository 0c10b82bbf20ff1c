// progress.rs — Progress & status engine.
//
// Turns a freshly measured value into (progress, status, achieved_at) for a
// goal. Pure: the caller passes `now`, and persistence and notification
// happen after this returns.
//
// Checks run in a fixed order from a non-terminal status:
//   1. progress >= 100                   → Achieved (wins on the deadline day)
//   2. deadline passed                   → Failed
//   3. low progress, most time used      → AtRisk (only from InProgress)
// Achieved and Failed are absorbing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AtRiskThresholds;
use crate::goal::{Goal, GoalStatus};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Result of evaluating one goal against a measured value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Percentage of target reached, 0–100, two decimals.
    pub progress: f64,
    pub status: GoalStatus,
    pub achieved_at: Option<DateTime<Utc>>,
    /// Whole days until the target date, rounded up. Negative once the
    /// deadline has passed by a full day or more.
    pub days_left: i64,
    /// Share of the goal window already elapsed, in percent.
    pub time_used_percent: f64,
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `min(100, round2(100 * current / target))`, or 0 for a non-positive target.
pub fn compute_progress(current_value: f64, target_value: f64) -> f64 {
    if target_value > 0.0 {
        round2(100.0 * current_value / target_value).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// `ceil((target_date - now) / 1 day)`.
pub fn days_left(target_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (target_date - now).num_milliseconds() as f64 / 1000.0;
    (seconds / SECONDS_PER_DAY).ceil() as i64
}

/// Percentage of `[start_date, target_date]` elapsed at `now`.
///
/// A degenerate window counts as fully used.
pub fn time_used_percent(
    start_date: DateTime<Utc>,
    target_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let total = (target_date - start_date).num_milliseconds();
    if total <= 0 {
        return 100.0;
    }
    let used = (now - start_date).num_milliseconds();
    100.0 * used as f64 / total as f64
}

/// Evaluate `goal` as if its metric now reads `current_value`.
pub fn evaluate(
    goal: &Goal,
    current_value: f64,
    now: DateTime<Utc>,
    thresholds: &AtRiskThresholds,
) -> Evaluation {
    let progress = compute_progress(current_value, goal.target_value);
    let days_left = days_left(goal.target_date, now);
    let time_used_percent = time_used_percent(goal.start_date, goal.target_date, now);

    let status = match goal.status {
        GoalStatus::Achieved | GoalStatus::Failed => goal.status,
        GoalStatus::InProgress | GoalStatus::AtRisk => {
            if progress >= 100.0 {
                GoalStatus::Achieved
            } else if days_left < 0 {
                GoalStatus::Failed
            } else if goal.status == GoalStatus::InProgress
                && progress < thresholds.progress_below
                && time_used_percent > thresholds.time_used_above
            {
                GoalStatus::AtRisk
            } else {
                goal.status
            }
        }
    };

    let achieved_at = if status == GoalStatus::Achieved && goal.status != GoalStatus::Achieved {
        goal.achieved_at.or(Some(now))
    } else {
        goal.achieved_at
    };

    Evaluation {
        progress,
        status,
        achieved_at,
        days_left,
        time_used_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::GoalType;
    use chrono::Duration;

    /// A 30-day goal that started `days_in` days before `now`.
    fn goal_days_in(days_in: i64, now: DateTime<Utc>) -> Goal {
        let start = now - Duration::days(days_in);
        Goal::new(
            "stu-1",
            GoalType::HomeworkCompletion,
            "Homework",
            100.0,
            start,
            start + Duration::days(30),
        )
        .unwrap()
    }

    fn thresholds() -> AtRiskThresholds {
        AtRiskThresholds::default()
    }

    #[test]
    fn progress_is_capped_and_rounded() {
        assert_eq!(compute_progress(50.0, 200.0), 25.0);
        assert_eq!(compute_progress(1.0, 3.0), 33.33);
        assert_eq!(compute_progress(250.0, 100.0), 100.0);
        assert_eq!(compute_progress(5.0, 0.0), 0.0);
        assert_eq!(compute_progress(-5.0, 10.0), 0.0);
    }

    #[test]
    fn progress_formula_holds_over_a_grid() {
        for target in [1.0, 4.0, 37.5, 90.0, 100.0] {
            for step in 0..=40 {
                let current = step as f64 * target / 20.0;
                let p = compute_progress(current, target);
                assert!((0.0..=100.0).contains(&p));
                assert_eq!(p, round2(100.0 * current / target).min(100.0));
            }
        }
    }

    #[test]
    fn days_left_rounds_up() {
        let now = Utc::now();
        assert_eq!(days_left(now + Duration::hours(36), now), 2);
        assert_eq!(days_left(now + Duration::days(3), now), 3);
        assert_eq!(days_left(now - Duration::hours(12), now), 0);
        assert_eq!(days_left(now - Duration::hours(30), now), -1);
    }

    #[test]
    fn just_under_time_threshold_stays_in_progress() {
        let now = Utc::now();
        let goal = goal_days_in(20, now);
        let eval = evaluate(&goal, 20.0, now, &thresholds());
        assert!(eval.time_used_percent < 70.0);
        assert_eq!(eval.progress, 20.0);
        assert_eq!(eval.status, GoalStatus::InProgress);
    }

    #[test]
    fn past_time_threshold_with_low_progress_is_at_risk() {
        let now = Utc::now();
        let goal = goal_days_in(22, now);
        let eval = evaluate(&goal, 20.0, now, &thresholds());
        assert!(eval.time_used_percent > 70.0);
        assert_eq!(eval.status, GoalStatus::AtRisk);
        assert!(eval.achieved_at.is_none());
    }

    #[test]
    fn enough_progress_late_in_window_is_not_at_risk() {
        let now = Utc::now();
        let goal = goal_days_in(25, now);
        let eval = evaluate(&goal, 30.0, now, &thresholds());
        assert_eq!(eval.status, GoalStatus::InProgress);
    }

    #[test]
    fn reaching_target_achieves_from_in_progress_and_at_risk() {
        let now = Utc::now();
        for prior in GoalStatus::ACTIVE {
            let mut goal = goal_days_in(10, now);
            goal.status = prior;
            let eval = evaluate(&goal, 100.0, now, &thresholds());
            assert_eq!(eval.status, GoalStatus::Achieved);
            assert_eq!(eval.progress, 100.0);
            assert_eq!(eval.achieved_at, Some(now));
        }
    }

    #[test]
    fn past_deadline_without_target_fails() {
        let now = Utc::now();
        let goal = goal_days_in(35, now);
        let eval = evaluate(&goal, 80.0, now, &thresholds());
        assert_eq!(eval.progress, 80.0);
        assert!(eval.days_left < 0);
        assert_eq!(eval.status, GoalStatus::Failed);
        assert!(eval.achieved_at.is_none());
    }

    #[test]
    fn achieved_wins_over_failed_past_deadline() {
        let now = Utc::now();
        let goal = goal_days_in(35, now);
        let eval = evaluate(&goal, 100.0, now, &thresholds());
        assert_eq!(eval.status, GoalStatus::Achieved);
    }

    #[test]
    fn at_risk_goal_can_still_fail() {
        let now = Utc::now();
        let mut goal = goal_days_in(32, now);
        goal.status = GoalStatus::AtRisk;
        let eval = evaluate(&goal, 10.0, now, &thresholds());
        assert_eq!(eval.status, GoalStatus::Failed);
    }

    #[test]
    fn at_risk_does_not_recover_to_in_progress() {
        let now = Utc::now();
        let mut goal = goal_days_in(5, now);
        goal.status = GoalStatus::AtRisk;
        let eval = evaluate(&goal, 60.0, now, &thresholds());
        assert_eq!(eval.status, GoalStatus::AtRisk);
    }

    #[test]
    fn terminal_statuses_are_absorbing() {
        let now = Utc::now();
        let stamped = now - Duration::days(3);

        let mut achieved = goal_days_in(40, now);
        achieved.status = GoalStatus::Achieved;
        achieved.achieved_at = Some(stamped);
        let eval = evaluate(&achieved, 0.0, now, &thresholds());
        assert_eq!(eval.status, GoalStatus::Achieved);
        assert_eq!(eval.achieved_at, Some(stamped));

        let mut failed = goal_days_in(40, now);
        failed.status = GoalStatus::Failed;
        let eval = evaluate(&failed, 500.0, now, &thresholds());
        assert_eq!(eval.status, GoalStatus::Failed);
        assert!(eval.achieved_at.is_none());
    }

    #[test]
    fn thresholds_are_configurable() {
        let now = Utc::now();
        let goal = goal_days_in(20, now);
        let strict = AtRiskThresholds {
            progress_below: 50.0,
            time_used_above: 60.0,
        };
        let eval = evaluate(&goal, 40.0, now, &strict);
        assert_eq!(eval.status, GoalStatus::AtRisk);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let now = Utc::now();
        let goal = goal_days_in(22, now);
        let first = evaluate(&goal, 12.5, now, &thresholds());
        let second = evaluate(&goal, 12.5, now, &thresholds());
        assert_eq!(first, second);
    }
}
