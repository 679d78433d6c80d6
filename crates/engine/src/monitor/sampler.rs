//! Background sampling loop
//!
//! Periodically collects host metrics, evaluates thresholds and, when
//! enabled, runs automatic optimization.

use super::PerformanceMonitor;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

pub(super) async fn run(
    monitor: Weak<PerformanceMonitor>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(
        interval_secs = period.as_secs(),
        "Starting performance sampling loop"
    );

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cycles = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(monitor) = monitor.upgrade() else {
                    debug!("Monitor dropped, stopping sampling loop");
                    break;
                };

                let start = Instant::now();
                let outcome = monitor.sample_once().await;
                cycles += 1;

                debug!(
                    cycle = cycles,
                    metrics = outcome.snapshot.len(),
                    alerts = outcome.alerts.len(),
                    actions = outcome.actions.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Sampling cycle complete"
                );
            }
            _ = shutdown.recv() => {
                info!(cycles = cycles, "Shutting down performance sampling loop");
                break;
            }
        }
    }
}
