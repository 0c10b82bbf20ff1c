// sources.rs — Read-only collaborator contracts the evaluator pulls metrics from.
//
// These traits are pure data fetch: attendance counts, the latest
// precomputed progress snapshot, recent daily-activity samples, and the
// student directory. Implementations may be slow or fail; the engine
// handles both at the per-goal boundary.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GoalError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Late,
    Absent,
    Excused,
}

/// One attendance mark for one student on one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: String,
    pub date: DateTime<Utc>,
    pub status: AttendanceStatus,
}

/// Inclusive time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Externally maintained aggregate of a student's recent performance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub student_id: String,
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub homework_completion_rate: f64,
    #[serde(default)]
    pub avg_behavior_rating: f64,
    #[serde(default)]
    pub reading_level: f64,
    #[serde(default)]
    pub writing_level: f64,
}

/// A teacher's read of how well the student understood one subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnderstandingSample {
    pub subject_id: String,
    pub level: f64,
}

/// Everything recorded about a student on one school day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyActivity {
    pub student_id: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub understanding: Vec<UnderstandingSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_ids: Vec<String>,
}

#[async_trait]
pub trait AttendanceSource: Send + Sync {
    /// Count a student's attendance records in `range`, optionally only
    /// those whose status is in `statuses`.
    async fn count(
        &self,
        student_id: &str,
        range: DateRange,
        statuses: Option<&[AttendanceStatus]>,
    ) -> Result<u64, GoalError>;
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// The most recent snapshot for a student, if any exists.
    async fn latest(&self, student_id: &str) -> Result<Option<ProgressSnapshot>, GoalError>;
}

#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Up to `limit` daily-activity records dated at or after `since`,
    /// newest first.
    async fn recent(
        &self,
        student_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DailyActivity>, GoalError>;
}

#[async_trait]
pub trait StudentDirectory: Send + Sync {
    async fn lookup(&self, student_id: &str) -> Result<Option<StudentRecord>, GoalError>;
}

/// The metric sources one evaluation reads from.
#[derive(Clone)]
pub struct MetricSources {
    pub attendance: Arc<dyn AttendanceSource>,
    pub snapshots: Arc<dyn SnapshotSource>,
    pub activity: Arc<dyn ActivitySource>,
}

impl MetricSources {
    pub fn new(
        attendance: Arc<dyn AttendanceSource>,
        snapshots: Arc<dyn SnapshotSource>,
        activity: Arc<dyn ActivitySource>,
    ) -> Self {
        Self {
            attendance,
            snapshots,
            activity,
        }
    }

    /// Use one backend for every metric.
    pub fn from_shared<S>(source: Arc<S>) -> Self
    where
        S: AttendanceSource + SnapshotSource + ActivitySource + 'static,
    {
        Self {
            attendance: source.clone(),
            snapshots: source.clone(),
            activity: source,
        }
    }
}
