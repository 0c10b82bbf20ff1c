// serve.rs — Periodic batch trigger.
//
// Runs `run_batch_evaluation` once at startup and then every
// `interval_minutes` until Ctrl-C. A failed run is logged and the loop
// keeps going; the next tick retries.

use std::future::Future;
use std::time::Duration;

use sg_goal::{GoalEngine, ProjectLayout};
use tokio::time::MissedTickBehavior;

use super::open_engine;

pub async fn execute(layout: &ProjectLayout, interval_minutes: u64) -> anyhow::Result<()> {
    if interval_minutes == 0 {
        anyhow::bail!("--interval-minutes must be at least 1");
    }

    let engine = open_engine(layout)?;
    let period = Duration::from_secs(interval_minutes * 60);

    tracing::info!("Starting batch evaluation loop");
    tracing::info!("Project root: {}", layout.root.display());
    tracing::info!("Interval: {} minute(s)", interval_minutes);

    let runs = run_until(&engine, period, tokio::signal::ctrl_c()).await;

    tracing::info!(runs, "Batch evaluation loop shutting down");
    Ok(())
}

/// Tick batch runs every `period` until `shutdown` resolves. Returns how many
/// runs were started.
///
/// The shutdown future is created once and polled by reference, so a signal
/// arriving while a batch is in flight is still seen on the next pass.
async fn run_until<F: Future>(engine: &GoalEngine, period: Duration, shutdown: F) -> usize {
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut runs = 0;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("Received shutdown signal");
                break;
            }
            _ = ticker.tick() => {
                runs += 1;
                if let Err(e) = engine.run_batch_evaluation().await {
                    tracing::error!("batch evaluation failed: {}", e);
                }
            }
        }
    }

    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn one_shutdown_future_ends_a_multi_tick_loop() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&ProjectLayout::for_project(dir.path())).unwrap();

        let runs = tokio::time::timeout(
            Duration::from_secs(5),
            run_until(
                &engine,
                Duration::from_millis(10),
                tokio::time::sleep(Duration::from_millis(100)),
            ),
        )
        .await
        .expect("loop should stop once the shutdown future resolves");

        assert!(runs >= 2, "only {runs} run(s) before shutdown");
    }

    #[tokio::test]
    async fn pending_shutdown_wins_over_the_first_tick() {
        let dir = tempdir().unwrap();
        let engine = open_engine(&ProjectLayout::for_project(dir.path())).unwrap();

        let runs = run_until(&engine, Duration::from_secs(60), std::future::ready(())).await;
        assert_eq!(runs, 0);
    }
}
