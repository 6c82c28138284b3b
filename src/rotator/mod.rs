use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::export::health::HealthMetrics;
use crate::stats::ErrorStats;

/// Background task that closes a bucket every interval.
///
/// Exactly one rotator should drive a given [`ErrorStats`].
pub struct Rotator {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Rotator {
    /// Spawn the rotation loop. The first rotation happens one full
    /// `interval` after spawning.
    pub fn spawn(
        stats: Arc<ErrorStats>,
        interval: Duration,
        cancel: CancellationToken,
        health: Option<Arc<HealthMetrics>>,
    ) -> Self {
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        debug!("rotator stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let started = Instant::now();

                        if let Err(e) = stats.tick() {
                            warn!(error = %e, "skipping rotation");
                            continue;
                        }

                        if let Some(ref h) = health {
                            h.rotations.inc();
                            h.rotation_duration
                                .observe(started.elapsed().as_secs_f64());
                        }
                    }
                }
            }
        });

        Self { cancel, handle }
    }

    /// Signal the loop to stop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to exit.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "rotator task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::code::ErrorCode;
    use crate::stats::severity::MessageType;
    use crate::stats::StatsConfig;

    fn stats(intervals_count: usize) -> Arc<ErrorStats> {
        let stats = Arc::new(ErrorStats::new());
        stats
            .initialize(&StatsConfig {
                interval: Duration::from_secs(1),
                intervals_count,
            })
            .expect("init");
        stats
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotates_once_per_interval() {
        let stats = stats(4);
        let rotator = Rotator::spawn(
            stats.clone(),
            Duration::from_secs(1),
            CancellationToken::new(),
            None,
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(stats.current_index(), Ok(0));

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(stats.current_index(), Ok(1));

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(stats.current_index(), Ok(3));

        rotator.stop();
        rotator.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_recorded_events_reach_history() {
        let stats = stats(2);
        let code = ErrorCode::pack(b"40001");
        let health = Arc::new(HealthMetrics::new(":0").expect("metrics"));
        let rotator = Rotator::spawn(
            stats.clone(),
            Duration::from_secs(1),
            CancellationToken::new(),
            Some(health.clone()),
        );

        stats.record(MessageType::Error, code);
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let state = stats.category(MessageType::Error, code).expect("state");
        assert_eq!(state.current, 0);
        assert_eq!(state.rolling_sum, 1);
        assert_eq!(health.rotations.get(), 1.0);

        rotator.stop();
        rotator.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_parent_cancel() {
        let stats = stats(2);
        let cancel = CancellationToken::new();
        let rotator = Rotator::spawn(
            stats.clone(),
            Duration::from_secs(1),
            cancel.child_token(),
            None,
        );

        cancel.cancel();
        rotator.join().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(stats.current_index(), Ok(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uninitialized_stats_are_skipped() {
        let stats = Arc::new(ErrorStats::new());
        let rotator = Rotator::spawn(
            stats.clone(),
            Duration::from_secs(1),
            CancellationToken::new(),
            None,
        );

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!stats.is_initialized());

        rotator.stop();
        rotator.join().await;
    }
}
