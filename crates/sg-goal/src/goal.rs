// goal.rs — Goal: a student-specific, time-boxed target on a measurable metric.
//
// The status state machine only moves forward:
//   InProgress → AtRisk
//   InProgress | AtRisk → Achieved | Failed
// Achieved and Failed are absorbing. Only a human override (outside the
// evaluation cycle) may move a goal backward.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GoalError;

/// What a goal measures. Closed set: each variant has exactly one evaluation
/// strategy (see `evaluator::measure`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalType {
    AttendanceRate,
    HomeworkCompletion,
    BehaviorScore,
    SubjectUnderstanding,
    ReadingSkill,
    WritingSkill,
    /// Set by teachers by hand; never auto-evaluated.
    Manual,
}

impl GoalType {
    pub const ALL: [GoalType; 7] = [
        GoalType::AttendanceRate,
        GoalType::HomeworkCompletion,
        GoalType::BehaviorScore,
        GoalType::SubjectUnderstanding,
        GoalType::ReadingSkill,
        GoalType::WritingSkill,
        GoalType::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::AttendanceRate => "ATTENDANCE_RATE",
            GoalType::HomeworkCompletion => "HOMEWORK_COMPLETION",
            GoalType::BehaviorScore => "BEHAVIOR_SCORE",
            GoalType::SubjectUnderstanding => "SUBJECT_UNDERSTANDING",
            GoalType::ReadingSkill => "READING_SKILL",
            GoalType::WritingSkill => "WRITING_SKILL",
            GoalType::Manual => "MANUAL",
        }
    }

    /// Whether the engine computes `current_value` for this type.
    pub fn is_auto_evaluated(&self) -> bool {
        !matches!(self, GoalType::Manual)
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalType {
    type Err = GoalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        GoalType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| GoalError::UnknownGoalType(s.to_string()))
    }
}

/// The lifecycle status of a goal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalStatus {
    InProgress,
    /// Too little progress for the time already used. Still open.
    AtRisk,
    Achieved,
    Failed,
}

impl GoalStatus {
    /// Statuses the evaluation cycle still works on.
    pub const ACTIVE: [GoalStatus; 2] = [GoalStatus::InProgress, GoalStatus::AtRisk];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::InProgress => "IN_PROGRESS",
            GoalStatus::AtRisk => "AT_RISK",
            GoalStatus::Achieved => "ACHIEVED",
            GoalStatus::Failed => "FAILED",
        }
    }

    /// Achieved and Failed absorb: no further automatic transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GoalStatus::Achieved | GoalStatus::Failed)
    }

    /// Check whether the evaluation cycle may move from this status to `next`.
    ///
    /// Staying put is always allowed. Human overrides bypass this check.
    pub fn can_transition_to(&self, next: GoalStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (GoalStatus::InProgress, GoalStatus::AtRisk)
                | (GoalStatus::InProgress, GoalStatus::Achieved)
                | (GoalStatus::InProgress, GoalStatus::Failed)
                | (GoalStatus::AtRisk, GoalStatus::Achieved)
                | (GoalStatus::AtRisk, GoalStatus::Failed)
        )
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalStatus {
    type Err = GoalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "IN_PROGRESS" => Ok(GoalStatus::InProgress),
            "AT_RISK" => Ok(GoalStatus::AtRisk),
            "ACHIEVED" => Ok(GoalStatus::Achieved),
            "FAILED" => Ok(GoalStatus::Failed),
            _ => Err(GoalError::UnknownStatus(s.to_string())),
        }
    }
}

/// How often the goal is meant to be reviewed. Informational only: the batch
/// scheduler uses its own recheck interval.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckFrequency {
    Daily,
    #[default]
    Weekly,
    Monthly,
}

/// A student goal and its last evaluated state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,

    pub student_id: String,

    /// Teacher who set the goal, if any. Receives status notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,

    pub goal_type: GoalType,

    /// Type-specific discriminator, e.g. the subject id for
    /// `SUBJECT_UNDERSTANDING`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub target_value: f64,

    /// Last computed metric value.
    #[serde(default)]
    pub current_value: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_value: Option<f64>,

    pub start_date: DateTime<Utc>,

    pub target_date: DateTime<Utc>,

    pub status: GoalStatus,

    /// Set once, on entering `Achieved`.
    #[serde(default)]
    pub achieved_at: Option<DateTime<Utc>>,

    /// Percentage of target reached, 0–100. Derived from `current_value`.
    #[serde(default)]
    pub progress: f64,

    /// Last evaluation attempt that read its metrics successfully.
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,

    #[serde(default)]
    pub check_frequency: CheckFrequency,

    #[serde(default = "default_visible")]
    pub visible_to_student: bool,

    #[serde(default)]
    pub visible_to_parent: bool,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

fn default_visible() -> bool {
    true
}

impl Goal {
    /// Create a new goal in the `InProgress` state.
    ///
    /// Rejects windows where `target_date` is not after `start_date` and
    /// non-positive targets on auto-evaluated types. Subject goals are
    /// checked by [`Goal::validate`] once the builder has set the metric.
    pub fn new(
        student_id: impl Into<String>,
        goal_type: GoalType,
        title: impl Into<String>,
        target_value: f64,
        start_date: DateTime<Utc>,
        target_date: DateTime<Utc>,
    ) -> Result<Self, GoalError> {
        if target_date <= start_date {
            return Err(GoalError::InvalidGoal(format!(
                "target date {} must be after start date {}",
                target_date, start_date
            )));
        }
        if goal_type.is_auto_evaluated() && (target_value.is_nan() || target_value <= 0.0) {
            return Err(GoalError::InvalidGoal(format!(
                "{} goals need a positive target value, got {}",
                goal_type, target_value
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            student_id: student_id.into(),
            teacher_id: None,
            goal_type,
            metric: None,
            title: title.into(),
            description: String::new(),
            target_value,
            current_value: 0.0,
            baseline_value: None,
            start_date,
            target_date,
            status: GoalStatus::InProgress,
            achieved_at: None,
            progress: 0.0,
            last_checked: None,
            check_frequency: CheckFrequency::default(),
            visible_to_student: true,
            visible_to_parent: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_teacher(mut self, teacher_id: impl Into<String>) -> Self {
        self.teacher_id = Some(teacher_id.into());
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_baseline(mut self, baseline: f64) -> Self {
        self.baseline_value = Some(baseline);
        self
    }

    /// Check cross-field rules that the builder methods can break.
    pub fn validate(&self) -> Result<(), GoalError> {
        if self.goal_type == GoalType::SubjectUnderstanding
            && self.metric.as_deref().map_or(true, |m| m.trim().is_empty())
        {
            return Err(GoalError::InvalidGoal(
                "SUBJECT_UNDERSTANDING goals need a subject metric".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a human status override.
    ///
    /// Unlike the evaluation cycle this may move backward. Entering
    /// `Achieved` stamps `achieved_at` if it was never set.
    pub fn override_status(&mut self, status: GoalStatus) {
        let now = Utc::now();
        if status == GoalStatus::Achieved && self.achieved_at.is_none() {
            self.achieved_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
    }
}
