// store.rs — Goal persistence contract and a JSON-file implementation.
//
// The engine only talks to `GoalStore`. JsonGoalStore keeps one JSON file
// per goal: `<store_dir>/<goal_id>.json`, which keeps goals isolated and
// makes the store easy to inspect by hand. An update replaces the whole
// record by rename, so all evaluated fields land together or not at all.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::error::GoalError;
use crate::goal::{Goal, GoalStatus, GoalType};
use crate::progress::Evaluation;

/// Fields written back by one evaluation. `None` leaves a field untouched;
/// in particular `achieved_at` is never cleared through an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalUpdate {
    pub current_value: Option<f64>,
    pub progress: Option<f64>,
    pub status: Option<GoalStatus>,
    pub achieved_at: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl GoalUpdate {
    /// Refresh `last_checked` only.
    pub fn checked(now: DateTime<Utc>) -> Self {
        Self {
            last_checked: Some(now),
            ..Self::default()
        }
    }

    /// Every evaluated field, written together.
    pub fn evaluated(current_value: f64, evaluation: &Evaluation, now: DateTime<Utc>) -> Self {
        Self {
            current_value: Some(current_value),
            progress: Some(evaluation.progress),
            status: Some(evaluation.status),
            achieved_at: evaluation.achieved_at,
            last_checked: Some(now),
        }
    }

    /// Whether this update touches anything besides `last_checked`.
    pub fn is_material(&self) -> bool {
        self.current_value.is_some()
            || self.progress.is_some()
            || self.status.is_some()
            || self.achieved_at.is_some()
    }

    pub fn apply_to(&self, goal: &mut Goal) {
        if let Some(v) = self.current_value {
            goal.current_value = v;
        }
        if let Some(p) = self.progress {
            goal.progress = p;
        }
        if let Some(s) = self.status {
            goal.status = s;
        }
        if let Some(at) = self.achieved_at {
            goal.achieved_at = Some(at);
        }
        if let Some(at) = self.last_checked {
            goal.last_checked = Some(at);
        }
        if self.is_material() {
            goal.updated_at = Utc::now();
        }
    }
}

/// Selection criteria for `GoalStore::find_many`. Empty fields match all.
#[derive(Debug, Clone, Default)]
pub struct GoalFilter {
    pub student_id: Option<String>,
    pub statuses: Vec<GoalStatus>,
    pub goal_type: Option<GoalType>,
}

impl GoalFilter {
    /// A student's goals the engine still evaluates.
    pub fn active_for_student(student_id: impl Into<String>) -> Self {
        Self {
            student_id: Some(student_id.into()),
            statuses: GoalStatus::ACTIVE.to_vec(),
            goal_type: None,
        }
    }

    pub fn matches(&self, goal: &Goal) -> bool {
        self.student_id
            .as_deref()
            .map_or(true, |s| goal.student_id == s)
            && (self.statuses.is_empty() || self.statuses.contains(&goal.status))
            && self.goal_type.map_or(true, |t| goal.goal_type == t)
    }
}

/// Whether the batch run should pick up `goal`: still active, computed by
/// the engine, and never checked or last checked before `cutoff`.
pub fn is_due_for_check(goal: &Goal, cutoff: DateTime<Utc>) -> bool {
    !goal.status.is_terminal()
        && goal.goal_type.is_auto_evaluated()
        && goal.last_checked.map_or(true, |at| at < cutoff)
}

/// Persistence for goals.
#[async_trait]
pub trait GoalStore: Send + Sync {
    async fn create(&self, goal: &Goal) -> Result<(), GoalError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Goal>, GoalError>;

    /// Apply `update` to the stored goal as a single write and return the result.
    async fn update(&self, id: Uuid, update: &GoalUpdate) -> Result<Goal, GoalError>;

    async fn find_many(&self, filter: &GoalFilter) -> Result<Vec<Goal>, GoalError>;

    /// Goals whose recheck is due as of `cutoff` (see [`is_due_for_check`]).
    async fn find_due_for_check(&self, cutoff: DateTime<Utc>) -> Result<Vec<Goal>, GoalError>;
}

/// Goal store backed by one JSON file per goal.
///
/// Writes go to a temporary file in the store directory which is then
/// renamed over `<id>.json`, so readers and crash recovery only ever see a
/// complete previous or complete new record.
pub struct JsonGoalStore {
    store_dir: PathBuf,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> GoalError + '_ {
    move |source| GoalError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl JsonGoalStore {
    /// Open the store, creating `store_dir` if needed.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self, GoalError> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(io_error(&store_dir))?;
        Ok(Self { store_dir })
    }

    /// Write `goal`, replacing any previous record for the same id.
    pub fn save(&self, goal: &Goal) -> Result<(), GoalError> {
        let path = self.goal_file(goal.id);
        let body = serde_json::to_vec_pretty(goal)?;

        let mut staged = NamedTempFile::new_in(&self.store_dir).map_err(io_error(&path))?;
        staged.write_all(&body).map_err(io_error(&path))?;
        staged.as_file().sync_all().map_err(io_error(&path))?;
        staged
            .persist(&path)
            .map_err(|e| io_error(&path)(e.error))?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Goal>, GoalError> {
        let path = self.goal_file(id);
        if !path.exists() {
            return Ok(None);
        }
        read_goal(&path).map(Some)
    }

    /// All stored goals, newest first. Unparseable records are logged and
    /// left out; staging files never match the `.json` suffix.
    pub fn list(&self) -> Result<Vec<Goal>, GoalError> {
        let entries = fs::read_dir(&self.store_dir).map_err(io_error(&self.store_dir))?;

        let mut goals = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_error(&self.store_dir))?.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match read_goal(&path) {
                Ok(goal) => goals.push(goal),
                Err(GoalError::Serialization(e)) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable goal file: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        goals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(goals)
    }

    /// Remove a goal's record. `Ok(false)` when there was none.
    pub fn delete(&self, id: Uuid) -> Result<bool, GoalError> {
        let path = self.goal_file(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    fn goal_file(&self, id: Uuid) -> PathBuf {
        self.store_dir.join(format!("{id}.json"))
    }
}

fn read_goal(path: &Path) -> Result<Goal, GoalError> {
    let body = fs::read(path).map_err(io_error(path))?;
    Ok(serde_json::from_slice(&body)?)
}

#[async_trait]
impl GoalStore for JsonGoalStore {
    async fn create(&self, goal: &Goal) -> Result<(), GoalError> {
        goal.validate()?;
        self.save(goal)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Goal>, GoalError> {
        self.get(id)
    }

    async fn update(&self, id: Uuid, update: &GoalUpdate) -> Result<Goal, GoalError> {
        let mut goal = self.get(id)?.ok_or(GoalError::NotFound(id))?;
        update.apply_to(&mut goal);
        self.save(&goal)?;
        Ok(goal)
    }

    async fn find_many(&self, filter: &GoalFilter) -> Result<Vec<Goal>, GoalError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|g| filter.matches(g))
            .collect())
    }

    async fn find_due_for_check(&self, cutoff: DateTime<Utc>) -> Result<Vec<Goal>, GoalError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|g| is_due_for_check(g, cutoff))
            .collect())
    }
}
