// config.rs — Engine configuration and on-disk project layout.
//
// EngineConfig is read from `.sg/engine.toml`. Every field has a default, so
// an empty or missing file yields the standard engine behavior.
// ProjectLayout names where the file-backed collaborators keep their data.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GoalError;

/// Longest recheck interval or metric window accepted from config (ten years).
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Tunables for the evaluation cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Goals whose `last_checked` is older than this many days are due for
    /// the batch run.
    #[serde(default = "default_recheck_interval_days")]
    pub recheck_interval_days: i64,

    /// Upper bound on goals evaluated at once during a batch run.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Value changes at or below this are noise and do not trigger a write.
    #[serde(default = "default_value_epsilon")]
    pub value_epsilon: f64,

    /// Trailing window for attendance and daily activity metrics.
    #[serde(default = "default_metric_window_days")]
    pub metric_window_days: i64,

    /// Most recent daily-activity records consulted for subject understanding.
    #[serde(default = "default_activity_sample_limit")]
    pub activity_sample_limit: usize,

    #[serde(default)]
    pub at_risk: AtRiskThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recheck_interval_days: default_recheck_interval_days(),
            max_concurrency: default_max_concurrency(),
            value_epsilon: default_value_epsilon(),
            metric_window_days: default_metric_window_days(),
            activity_sample_limit: default_activity_sample_limit(),
            at_risk: AtRiskThresholds::default(),
        }
    }
}

/// When an in-progress goal is flagged at risk: progress below
/// `progress_below` percent while more than `time_used_above` percent of the
/// window has elapsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AtRiskThresholds {
    #[serde(default = "default_progress_below")]
    pub progress_below: f64,

    #[serde(default = "default_time_used_above")]
    pub time_used_above: f64,
}

impl Default for AtRiskThresholds {
    fn default() -> Self {
        Self {
            progress_below: default_progress_below(),
            time_used_above: default_time_used_above(),
        }
    }
}

// Serde default functions
fn default_recheck_interval_days() -> i64 {
    7
}

fn default_max_concurrency() -> usize {
    25
}

fn default_value_epsilon() -> f64 {
    0.01
}

fn default_metric_window_days() -> i64 {
    30
}

fn default_activity_sample_limit() -> usize {
    20
}

fn default_progress_below() -> f64 {
    30.0
}

fn default_time_used_above() -> f64 {
    70.0
}

impl EngineConfig {
    /// Load engine config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, GoalError> {
        let content = std::fs::read_to_string(path).map_err(|source| GoalError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: EngineConfig = toml::from_str(&content)
            .map_err(|e| GoalError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config if the file exists, otherwise use defaults.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, GoalError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), GoalError> {
        if self.max_concurrency == 0 {
            return Err(GoalError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if !(0..=MAX_WINDOW_DAYS).contains(&self.recheck_interval_days) {
            return Err(GoalError::Config(format!(
                "recheck_interval_days must be between 0 and {MAX_WINDOW_DAYS}"
            )));
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.metric_window_days) {
            return Err(GoalError::Config(format!(
                "metric_window_days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        if !self.value_epsilon.is_finite() || self.value_epsilon < 0.0 {
            return Err(GoalError::Config(
                "value_epsilon must be a finite, non-negative number".to_string(),
            ));
        }
        for (name, value) in [
            ("at_risk.progress_below", self.at_risk.progress_below),
            ("at_risk.time_used_above", self.at_risk.time_used_above),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(GoalError::Config(format!(
                    "{name} must be a percentage between 0 and 100"
                )));
            }
        }
        Ok(())
    }

    /// Goals last checked before this instant are due for the batch run.
    pub fn recheck_cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, GoalError> {
        days_before(now, self.recheck_interval_days, "recheck_interval_days")
    }

    /// Start of the trailing metric window ending at `now`.
    pub fn metric_window_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, GoalError> {
        days_before(now, self.metric_window_days, "metric_window_days")
    }
}

fn days_before(now: DateTime<Utc>, days: i64, field: &str) -> Result<DateTime<Utc>, GoalError> {
    Duration::try_days(days)
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| GoalError::Config(format!("{field} = {days} is out of range")))
}

/// Standard `.sg/` layout for a project directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectLayout {
    pub root: PathBuf,

    /// JsonGoalStore directory (one JSON file per goal).
    pub goals_dir: PathBuf,

    /// Directory holding the JSONL metric files read by JsonlMetricSource.
    pub data_dir: PathBuf,

    /// Notification log written by LogSink.
    pub notifications_log: PathBuf,

    pub engine_config: PathBuf,
}

impl ProjectLayout {
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let sg_dir = root.join(".sg");
        Self {
            root,
            goals_dir: sg_dir.join("goals"),
            data_dir: sg_dir.join("data"),
            notifications_log: sg_dir.join("notifications.jsonl"),
            engine_config: sg_dir.join("engine.toml"),
        }
    }
}
