// notification.rs — Status-change notifications and their delivery sinks.
//
// The engine emits one GoalNotification per observed status transition into
// Achieved, AtRisk, or Failed. Sinks (log file, in-memory collector, or a
// messaging service adapter) receive it. Delivery is best-effort: a sink
// error is logged and never undoes the goal update that caused it.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::change::StatusTransition;
use crate::error::GoalError;
use crate::goal::{Goal, GoalStatus};
use crate::progress::Evaluation;
use crate::sources::{StudentDirectory, StudentRecord};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    GoalAchieved,
    GoalAtRisk,
    GoalFailed,
}

impl NotificationType {
    /// The notification announcing entry into `status`, if that status is
    /// announced at all.
    pub fn for_status(status: GoalStatus) -> Option<Self> {
        match status {
            GoalStatus::Achieved => Some(NotificationType::GoalAchieved),
            GoalStatus::AtRisk => Some(NotificationType::GoalAtRisk),
            GoalStatus::Failed => Some(NotificationType::GoalFailed),
            GoalStatus::InProgress => None,
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            NotificationType::GoalAchieved | NotificationType::GoalAtRisk => Priority::High,
            NotificationType::GoalFailed => Priority::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientType {
    Teacher,
    Student,
    Parent,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    Goals,
}

/// Structured payload carried alongside the human-readable text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub goal_id: Uuid,
    pub progress: f64,
    pub days_left: i64,
}

/// What the messaging collaborator receives for one status transition.
///
/// `recipient_ids` and `recipient_types` are index-aligned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalNotification {
    pub student_id: String,
    pub recipient_ids: Vec<String>,
    pub recipient_types: Vec<RecipientType>,
    pub notification_type: NotificationType,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub data: NotificationData,
    pub created_at: DateTime<Utc>,
}

impl GoalNotification {
    /// Build the notification for `transition`, or `None` when the new
    /// status is not announced or nobody is in the audience.
    ///
    /// `student` is the directory record when it could be resolved.
    pub fn for_transition(
        goal: &Goal,
        transition: StatusTransition,
        evaluation: &Evaluation,
        student: Option<&StudentRecord>,
    ) -> Option<Self> {
        let notification_type = NotificationType::for_status(transition.to)?;

        let mut recipient_ids = Vec::new();
        let mut recipient_types = Vec::new();
        if let Some(teacher) = &goal.teacher_id {
            recipient_ids.push(teacher.clone());
            recipient_types.push(RecipientType::Teacher);
        }
        if goal.visible_to_student {
            recipient_ids.push(goal.student_id.clone());
            recipient_types.push(RecipientType::Student);
        }
        if goal.visible_to_parent {
            for parent in student.map(|s| s.parent_ids.as_slice()).unwrap_or_default() {
                recipient_ids.push(parent.clone());
                recipient_types.push(RecipientType::Parent);
            }
        }
        if recipient_ids.is_empty() {
            return None;
        }

        let name = student.map(|s| s.name.as_str()).unwrap_or("Student");
        let (title, message) = match notification_type {
            NotificationType::GoalAchieved => (
                format!("Goal achieved: {}", goal.title),
                format!(
                    "{} reached the goal \"{}\" with {}% progress.",
                    name, goal.title, evaluation.progress
                ),
            ),
            NotificationType::GoalAtRisk => (
                format!("Goal at risk: {}", goal.title),
                format!(
                    "{} is at {}% of \"{}\" with {} days remaining.",
                    name,
                    evaluation.progress,
                    goal.title,
                    evaluation.days_left.max(0)
                ),
            ),
            NotificationType::GoalFailed => (
                format!("Goal missed: {}", goal.title),
                format!(
                    "{} did not reach \"{}\" by the target date ({}% progress).",
                    name, goal.title, evaluation.progress
                ),
            ),
        };

        Some(Self {
            student_id: goal.student_id.clone(),
            recipient_ids,
            recipient_types,
            notification_type,
            category: NotificationCategory::Goals,
            title,
            message,
            priority: notification_type.priority(),
            data: NotificationData {
                goal_id: goal.id,
                progress: evaluation.progress,
                days_left: evaluation.days_left,
            },
            created_at: Utc::now(),
        })
    }
}

/// Trait for receiving goal notifications.
///
/// Implementations hand the payload to a transport: a log file, a push
/// service, an email relay.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification. Errors are logged by the caller.
    async fn send(&self, notification: &GoalNotification) -> Result<(), GoalError>;
}

#[async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    async fn send(&self, notification: &GoalNotification) -> Result<(), GoalError> {
        (**self).send(notification).await
    }
}

/// Appends notifications as JSONL to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, notification: &GoalNotification) -> Result<(), GoalError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| GoalError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| GoalError::Io {
                path: self.path.display().to_string(),
                source,
            })?;

        let json = serde_json::to_string(notification)?;
        writeln!(file, "{}", json).map_err(|source| GoalError::Io {
            path: self.path.display().to_string(),
            source,
        })?;

        Ok(())
    }
}

/// Collects notifications in memory, for embedding callers that drain them
/// on their own schedule.
#[derive(Default)]
pub struct MemorySink {
    received: Mutex<Vec<GoalNotification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<GoalNotification> {
        self.received
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn send(&self, notification: &GoalNotification) -> Result<(), GoalError> {
        self.received
            .lock()
            .map_err(|_| GoalError::NotificationError("memory sink poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

/// Turns status transitions into notifications and fans them out to sinks.
///
/// Student names (and parent ids) come from the directory when one is
/// configured; a failed lookup falls back to a generic label.
#[derive(Default)]
pub struct Notifier {
    sinks: Vec<Box<dyn NotificationSink>>,
    directory: Option<Arc<dyn StudentDirectory>>,
}

impl Notifier {
    /// Create a notifier with no sinks and no directory.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directory(mut self, directory: Arc<dyn StudentDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Emit the notification for one observed transition.
    ///
    /// Returns what was emitted, or `None` if the transition is not
    /// announced or has no audience.
    pub async fn notify_transition(
        &self,
        goal: &Goal,
        transition: StatusTransition,
        evaluation: &Evaluation,
    ) -> Option<GoalNotification> {
        NotificationType::for_status(transition.to)?;

        let student = self.resolve_student(&goal.student_id).await;
        let Some(notification) =
            GoalNotification::for_transition(goal, transition, evaluation, student.as_ref())
        else {
            tracing::debug!(goal_id = %goal.id, "no audience for {} notification", transition.to);
            return None;
        };

        self.dispatch(&notification).await;
        Some(notification)
    }

    /// Send to every sink. Sink errors are logged and skipped.
    pub async fn dispatch(&self, notification: &GoalNotification) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(notification).await {
                tracing::warn!(
                    goal_id = %notification.data.goal_id,
                    "notification sink error: {}",
                    e
                );
            }
        }
    }

    async fn resolve_student(&self, student_id: &str) -> Option<StudentRecord> {
        let directory = self.directory.as_ref()?;
        match directory.lookup(student_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(student_id, "student lookup failed: {}", e);
                None
            }
        }
    }
}
