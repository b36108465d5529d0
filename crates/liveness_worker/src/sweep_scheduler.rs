use crate::domain::StalenessSweepService;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs the staleness sweep on a fixed interval until cancelled.
/// A failed run is logged and retried on the next tick.
pub struct SweepScheduler {
    service: Arc<StalenessSweepService>,
    interval: Duration,
}

impl SweepScheduler {
    pub fn new(service: Arc<StalenessSweepService>, interval: Duration) -> Self {
        Self { service, interval }
    }

    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(interval_secs = self.interval.as_secs(), "starting staleness sweep scheduler");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("received shutdown signal, stopping sweep scheduler");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.service.run_sweep(Utc::now()).await {
                        error!(error = %e, "staleness sweep failed");
                    }
                }
            }
        }

        Ok(())
    }
}
