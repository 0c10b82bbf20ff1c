// error.rs — Error types for the goal evaluation subsystem.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while storing, evaluating, or notifying about goals.
#[derive(Debug, Error)]
pub enum GoalError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize goal data.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The engine configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// The requested goal was not found.
    #[error("goal not found: {0}")]
    NotFound(Uuid),

    /// A goal failed construction-time validation.
    #[error("invalid goal: {0}")]
    InvalidGoal(String),

    /// A goal type string did not name any known type.
    #[error("unknown goal type: {0}")]
    UnknownGoalType(String),

    /// A goal status string did not name any known status.
    #[error("unknown goal status: {0}")]
    UnknownStatus(String),

    /// A metric source (attendance, snapshots, activity, directory) could not be read.
    #[error("metric source '{source_name}' failed: {message}")]
    MetricSource {
        source_name: String,
        message: String,
    },

    /// A notification dispatch failed (non-fatal).
    #[error("notification error: {0}")]
    NotificationError(String),
}

impl GoalError {
    /// Shorthand for a metric source failure.
    pub fn metric_source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        GoalError::MetricSource {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from reading a metric source.
    ///
    /// Metric failures skip the goal for this cycle; everything else is a
    /// persistence problem the caller has to see.
    pub fn is_metric_failure(&self) -> bool {
        matches!(self, GoalError::MetricSource { .. })
    }
}
