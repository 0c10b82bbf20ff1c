pub mod evaluate;
pub mod goal;
pub mod serve;

use std::sync::Arc;

use sg_goal::{
    EngineConfig, GoalEngine, JsonGoalStore, JsonlMetricSource, LogSink, MetricSources, Notifier,
    ProjectLayout,
};

/// Wire the engine to the project's file-backed store, metric files and
/// notification log.
pub fn open_engine(layout: &ProjectLayout) -> anyhow::Result<GoalEngine> {
    let config = EngineConfig::load_or_default(&layout.engine_config)?;
    let store = Arc::new(JsonGoalStore::new(&layout.goals_dir)?);
    let metrics = Arc::new(JsonlMetricSource::new(&layout.data_dir));

    let mut notifier = Notifier::new().with_directory(metrics.clone());
    notifier.add_sink(Box::new(LogSink::new(&layout.notifications_log)));

    Ok(GoalEngine::new(
        store,
        MetricSources::from_shared(metrics),
        notifier,
        config,
    ))
}
