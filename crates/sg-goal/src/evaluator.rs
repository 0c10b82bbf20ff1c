// evaluator.rs — Evaluator strategy table.
//
// One strategy per goal type, dispatched by an exhaustive match. Manual
// goals produce `Measurement::NotEvaluable`, which the scheduler treats as
// "skip, nothing to write".

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::error::GoalError;
use crate::goal::{Goal, GoalType};
use crate::progress::round2;
use crate::sources::{AttendanceStatus, DateRange, MetricSources, ProgressSnapshot};

/// Attendance marks that count toward the attendance rate.
const ATTENDED: &[AttendanceStatus] = &[AttendanceStatus::Present, AttendanceStatus::Late];

/// Outcome of measuring a goal's metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    Value(f64),
    /// The goal type is not computed by the engine.
    NotEvaluable,
}

/// Compute the current metric value for `goal` at `now`.
pub async fn measure(
    goal: &Goal,
    sources: &MetricSources,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<Measurement, GoalError> {
    let student = goal.student_id.as_str();
    let window = DateRange::new(config.metric_window_start(now)?, now);

    let value = match goal.goal_type {
        GoalType::AttendanceRate => attendance_rate(sources, student, window).await?,
        GoalType::HomeworkCompletion => {
            snapshot_field(sources, student, |s| s.homework_completion_rate).await?
        }
        GoalType::BehaviorScore => {
            snapshot_field(sources, student, |s| s.avg_behavior_rating).await?
        }
        GoalType::SubjectUnderstanding => {
            let subject = goal.metric.as_deref().unwrap_or_default();
            subject_understanding(sources, student, subject, window, config).await?
        }
        GoalType::ReadingSkill => snapshot_field(sources, student, |s| s.reading_level).await?,
        GoalType::WritingSkill => snapshot_field(sources, student, |s| s.writing_level).await?,
        GoalType::Manual => return Ok(Measurement::NotEvaluable),
    };

    Ok(Measurement::Value(value))
}

/// Present-or-late share of attendance records in the window, in percent.
async fn attendance_rate(
    sources: &MetricSources,
    student_id: &str,
    window: DateRange,
) -> Result<f64, GoalError> {
    let total = sources.attendance.count(student_id, window, None).await?;
    if total == 0 {
        return Ok(0.0);
    }
    let attended = sources
        .attendance
        .count(student_id, window, Some(ATTENDED))
        .await?;
    Ok(round2(attended as f64 / total as f64 * 100.0))
}

async fn snapshot_field(
    sources: &MetricSources,
    student_id: &str,
    field: impl Fn(&ProgressSnapshot) -> f64,
) -> Result<f64, GoalError> {
    Ok(sources
        .snapshots
        .latest(student_id)
        .await?
        .map(|s| field(&s))
        .unwrap_or(0.0))
}

/// Mean understanding level for one subject over the most recent activity
/// records in the window.
async fn subject_understanding(
    sources: &MetricSources,
    student_id: &str,
    subject_id: &str,
    window: DateRange,
    config: &EngineConfig,
) -> Result<f64, GoalError> {
    let activities = sources
        .activity
        .recent(student_id, window.start, config.activity_sample_limit)
        .await?;

    let levels: Vec<f64> = activities
        .iter()
        .flat_map(|a| a.understanding.iter())
        .filter(|s| s.subject_id == subject_id)
        .map(|s| s.level)
        .collect();

    if levels.is_empty() {
        return Ok(0.0);
    }
    Ok(levels.iter().sum::<f64>() / levels.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{
        ActivitySource, AttendanceRecord, AttendanceSource, DailyActivity, SnapshotSource,
        UnderstandingSample,
    };
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeSource {
        attendance: Vec<AttendanceRecord>,
        snapshot: Option<ProgressSnapshot>,
        activities: Vec<DailyActivity>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn touch(&self) -> Result<(), GoalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(GoalError::metric_source("fake", "offline"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl AttendanceSource for FakeSource {
        async fn count(
            &self,
            student_id: &str,
            range: DateRange,
            statuses: Option<&[AttendanceStatus]>,
        ) -> Result<u64, GoalError> {
            self.touch()?;
            Ok(self
                .attendance
                .iter()
                .filter(|r| r.student_id == student_id && range.contains(r.date))
                .filter(|r| statuses.map_or(true, |s| s.contains(&r.status)))
                .count() as u64)
        }
    }

    #[async_trait]
    impl SnapshotSource for FakeSource {
        async fn latest(&self, _student_id: &str) -> Result<Option<ProgressSnapshot>, GoalError> {
            self.touch()?;
            Ok(self.snapshot.clone())
        }
    }

    #[async_trait]
    impl ActivitySource for FakeSource {
        async fn recent(
            &self,
            _student_id: &str,
            since: DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<DailyActivity>, GoalError> {
            self.touch()?;
            Ok(self
                .activities
                .iter()
                .filter(|a| a.date >= since)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    fn goal(goal_type: GoalType, target: f64) -> Goal {
        let start = Utc::now() - Duration::days(5);
        Goal::new("stu-1", goal_type, "goal", target, start, start + Duration::days(30)).unwrap()
    }

    fn sources(fake: FakeSource) -> (Arc<FakeSource>, MetricSources) {
        let fake = Arc::new(fake);
        (fake.clone(), MetricSources::from_shared(fake))
    }

    fn mark(days_ago: i64, status: AttendanceStatus) -> AttendanceRecord {
        AttendanceRecord {
            student_id: "stu-1".to_string(),
            date: Utc::now() - Duration::days(days_ago),
            status,
        }
    }

    fn snapshot() -> ProgressSnapshot {
        ProgressSnapshot {
            student_id: "stu-1".to_string(),
            taken_at: Utc::now(),
            homework_completion_rate: 72.5,
            avg_behavior_rating: 4.2,
            reading_level: 3.0,
            writing_level: 2.5,
        }
    }

    fn activity(days_ago: i64, samples: &[(&str, f64)]) -> DailyActivity {
        DailyActivity {
            student_id: "stu-1".to_string(),
            date: Utc::now() - Duration::days(days_ago),
            understanding: samples
                .iter()
                .map(|(subject, level)| UnderstandingSample {
                    subject_id: subject.to_string(),
                    level: *level,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn attendance_rate_counts_present_and_late() {
        let mut attendance = Vec::new();
        for day in 0..24 {
            attendance.push(mark(day, AttendanceStatus::Present));
        }
        for day in 24..27 {
            attendance.push(mark(day, AttendanceStatus::Late));
        }
        for day in 27..30 {
            attendance.push(mark(day, AttendanceStatus::Absent));
        }
        // Outside the trailing window; ignored.
        attendance.push(mark(45, AttendanceStatus::Absent));

        let (_, sources) = sources(FakeSource {
            attendance,
            ..Default::default()
        });
        let m = measure(
            &goal(GoalType::AttendanceRate, 90.0),
            &sources,
            &EngineConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(m, Measurement::Value(90.0));
    }

    #[tokio::test]
    async fn attendance_without_records_is_zero() {
        let (_, sources) = sources(FakeSource::default());
        let m = measure(
            &goal(GoalType::AttendanceRate, 90.0),
            &sources,
            &EngineConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(m, Measurement::Value(0.0));
    }

    #[tokio::test]
    async fn snapshot_strategies_read_their_field() {
        let (_, sources) = sources(FakeSource {
            snapshot: Some(snapshot()),
            ..Default::default()
        });
        let config = EngineConfig::default();
        let now = Utc::now();
        let cases = [
            (GoalType::HomeworkCompletion, 72.5),
            (GoalType::BehaviorScore, 4.2),
            (GoalType::ReadingSkill, 3.0),
            (GoalType::WritingSkill, 2.5),
        ];
        for (goal_type, expected) in cases {
            let m = measure(&goal(goal_type, 5.0), &sources, &config, now)
                .await
                .unwrap();
            assert_eq!(m, Measurement::Value(expected), "{goal_type}");
        }
    }

    #[tokio::test]
    async fn missing_snapshot_reads_zero() {
        let (_, sources) = sources(FakeSource::default());
        let m = measure(
            &goal(GoalType::HomeworkCompletion, 80.0),
            &sources,
            &EngineConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(m, Measurement::Value(0.0));
    }

    #[tokio::test]
    async fn subject_understanding_averages_matching_samples() {
        let (_, sources) = sources(FakeSource {
            activities: vec![
                activity(1, &[("math", 4.0), ("art", 1.0)]),
                activity(2, &[("math", 3.0)]),
                activity(3, &[("science", 5.0)]),
                activity(4, &[("math", 2.0)]),
                activity(40, &[("math", 0.0)]),
            ],
            ..Default::default()
        });
        let g = goal(GoalType::SubjectUnderstanding, 4.0).with_metric("math");
        let m = measure(&g, &sources, &EngineConfig::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(m, Measurement::Value(3.0));
    }

    #[tokio::test]
    async fn subject_understanding_respects_sample_limit() {
        let (_, sources) = sources(FakeSource {
            activities: vec![
                activity(1, &[("math", 4.0)]),
                activity(2, &[("math", 1.0)]),
            ],
            ..Default::default()
        });
        let config = EngineConfig {
            activity_sample_limit: 1,
            ..EngineConfig::default()
        };
        let g = goal(GoalType::SubjectUnderstanding, 4.0).with_metric("math");
        let m = measure(&g, &sources, &config, Utc::now()).await.unwrap();
        assert_eq!(m, Measurement::Value(4.0));
    }

    #[tokio::test]
    async fn subject_understanding_keeps_the_exact_mean() {
        let (_, sources) = sources(FakeSource {
            activities: vec![
                activity(1, &[("math", 1.0)]),
                activity(2, &[("math", 2.0)]),
                activity(3, &[("math", 2.0)]),
            ],
            ..Default::default()
        });
        let g = goal(GoalType::SubjectUnderstanding, 4.0).with_metric("math");
        let m = measure(&g, &sources, &EngineConfig::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(m, Measurement::Value(5.0 / 3.0));
    }

    #[tokio::test]
    async fn subject_without_samples_is_zero() {
        let (_, sources) = sources(FakeSource {
            activities: vec![activity(1, &[("art", 4.0)])],
            ..Default::default()
        });
        let g = goal(GoalType::SubjectUnderstanding, 4.0).with_metric("math");
        let m = measure(&g, &sources, &EngineConfig::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(m, Measurement::Value(0.0));
    }

    #[tokio::test]
    async fn manual_goals_are_not_evaluable_and_read_nothing() {
        let (fake, sources) = sources(FakeSource {
            fail: true,
            ..Default::default()
        });
        let m = measure(
            &goal(GoalType::Manual, 1.0),
            &sources,
            &EngineConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(m, Measurement::NotEvaluable);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn source_failure_propagates_as_metric_error() {
        let (_, sources) = sources(FakeSource {
            fail: true,
            ..Default::default()
        });
        let err = measure(
            &goal(GoalType::ReadingSkill, 3.0),
            &sources,
            &EngineConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(err.is_metric_failure());
    }

    #[tokio::test]
    async fn unrepresentable_metric_window_is_a_config_error() {
        let (fake, sources) = sources(FakeSource::default());
        let config = EngineConfig {
            metric_window_days: 100_000_000,
            ..EngineConfig::default()
        };
        let err = measure(
            &goal(GoalType::AttendanceRate, 90.0),
            &sources,
            &config,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GoalError::Config(_)), "{err}");
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }
}
