// jsonl_source.rs — File-backed metric sources and student directory.
//
// Reads newline-delimited JSON from a data directory:
//
//   attendance.jsonl   AttendanceRecord per line
//   snapshots.jsonl    ProgressSnapshot per line
//   activities.jsonl   DailyActivity per line
//   students.jsonl     StudentRecord per line
//
// Files are re-read on every call so external writers are picked up without
// a restart. A missing file means no records. A malformed line fails the
// read with a MetricSource error naming the file and line.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::GoalError;
use crate::sources::{
    ActivitySource, AttendanceRecord, AttendanceSource, AttendanceStatus, DailyActivity,
    DateRange, ProgressSnapshot, SnapshotSource, StudentDirectory, StudentRecord,
};

pub const ATTENDANCE_FILE: &str = "attendance.jsonl";
pub const SNAPSHOTS_FILE: &str = "snapshots.jsonl";
pub const ACTIVITIES_FILE: &str = "activities.jsonl";
pub const STUDENTS_FILE: &str = "students.jsonl";

/// Metric sources and student directory backed by JSONL files.
#[derive(Debug, Clone)]
pub struct JsonlMetricSource {
    data_dir: PathBuf,
}

impl JsonlMetricSource {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn read_records<T: DeserializeOwned>(&self, file_name: &str) -> Result<Vec<T>, GoalError> {
        let path = self.data_dir.join(file_name);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            GoalError::metric_source(file_name, format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|e| {
                GoalError::metric_source(file_name, format!("line {}: {}", idx + 1, e))
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl AttendanceSource for JsonlMetricSource {
    async fn count(
        &self,
        student_id: &str,
        range: DateRange,
        statuses: Option<&[AttendanceStatus]>,
    ) -> Result<u64, GoalError> {
        let records: Vec<AttendanceRecord> = self.read_records(ATTENDANCE_FILE)?;
        let count = records
            .iter()
            .filter(|r| r.student_id == student_id && range.contains(r.date))
            .filter(|r| statuses.map_or(true, |wanted| wanted.contains(&r.status)))
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl SnapshotSource for JsonlMetricSource {
    async fn latest(&self, student_id: &str) -> Result<Option<ProgressSnapshot>, GoalError> {
        let snapshots: Vec<ProgressSnapshot> = self.read_records(SNAPSHOTS_FILE)?;
        Ok(snapshots
            .into_iter()
            .filter(|s| s.student_id == student_id)
            .max_by_key(|s| s.taken_at))
    }
}

#[async_trait]
impl ActivitySource for JsonlMetricSource {
    async fn recent(
        &self,
        student_id: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DailyActivity>, GoalError> {
        let mut activities: Vec<DailyActivity> = self
            .read_records::<DailyActivity>(ACTIVITIES_FILE)?
            .into_iter()
            .filter(|a| a.student_id == student_id && a.date >= since)
            .collect();
        activities.sort_by(|a, b| b.date.cmp(&a.date));
        activities.truncate(limit);
        Ok(activities)
    }
}

#[async_trait]
impl StudentDirectory for JsonlMetricSource {
    async fn lookup(&self, student_id: &str) -> Result<Option<StudentRecord>, GoalError> {
        let students: Vec<StudentRecord> = self.read_records(STUDENTS_FILE)?;
        Ok(students.into_iter().find(|s| s.id == student_id))
    }
}
