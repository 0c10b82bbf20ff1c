//! # sg-goal
//!
//! Goal tracking and auto-evaluation for School Goals.
//!
//! A [`Goal`] is a measurable target set for one student over a date window.
//! The engine periodically recomputes each goal's metric from attendance,
//! progress snapshots, and daily activity, derives progress and status, and
//! persists and announces only material changes. Status moves forward only:
//! IN_PROGRESS → AT_RISK → ACHIEVED / FAILED.
//!
//! ## Key components
//!
//! - [`Goal`] — the goal record and its status state machine
//! - [`evaluator::measure`] — one metric strategy per [`GoalType`]
//! - [`progress::evaluate`] — pure progress and status computation
//! - [`change::detect`] — epsilon gate between evaluation and persistence
//! - [`GoalEngine`] — targeted (per student) and batch evaluation
//! - [`GoalStore`] / [`JsonGoalStore`] — goal persistence
//! - [`JsonlMetricSource`] — file-backed metric sources and student directory
//! - [`Notifier`] — builds transition notifications and fans out to
//!   [`NotificationSink`]s

pub mod change;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod goal;
pub mod jsonl_source;
pub mod notification;
pub mod progress;
pub mod scheduler;
pub mod sources;
pub mod store;

pub use change::{Change, StatusTransition};
pub use config::{AtRiskThresholds, EngineConfig, ProjectLayout};
pub use error::GoalError;
pub use evaluator::Measurement;
pub use goal::{CheckFrequency, Goal, GoalStatus, GoalType};
pub use jsonl_source::JsonlMetricSource;
pub use notification::{
    GoalNotification, LogSink, MemorySink, NotificationCategory, NotificationSink,
    NotificationType, Notifier, Priority, RecipientType,
};
pub use progress::Evaluation;
pub use scheduler::{BatchSummary, EvaluationSummary, GoalEngine, GoalOutcome};
pub use sources::{
    ActivitySource, AttendanceSource, MetricSources, SnapshotSource, StudentDirectory,
};
pub use store::{GoalFilter, GoalStore, GoalUpdate, JsonGoalStore};
