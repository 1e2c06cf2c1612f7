/// Periodic fetch-and-update loop
use log::{debug, error, info};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::metrics::{MetricState, UpdateError};
use crate::models::DeviceSnapshot;
use crate::natureremo::{FetchError, NatureRemoClient};

/// Anything that can produce the current device list
pub trait DeviceSource {
    fn fetch_devices(&self)
        -> impl Future<Output = Result<Vec<DeviceSnapshot>, FetchError>> + Send;
}

impl DeviceSource for NatureRemoClient {
    async fn fetch_devices(&self) -> Result<Vec<DeviceSnapshot>, FetchError> {
        NatureRemoClient::fetch_devices(self).await
    }
}

/// Failure of one fetch-then-update cycle
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("failed to get all devices from Nature Remo API: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to set metrics: {0}")]
    Update(#[from] UpdateError),
}

/// What the loop does after a periodic cycle fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log the failure and keep refreshing; stale values stay published.
    #[default]
    Continue,
    /// Return the failure and stop refreshing.
    Stop,
}

pub struct RefreshScheduler<S> {
    source: S,
    state: MetricState,
    interval: Duration,
    policy: ErrorPolicy,
}

impl<S: DeviceSource> RefreshScheduler<S> {
    /// `interval` must be non-zero.
    pub fn new(source: S, state: MetricState, interval: Duration, policy: ErrorPolicy) -> Self {
        Self {
            source,
            state,
            interval,
            policy,
        }
    }

    /// Run one cycle immediately, then one per interval until `cancel` fires
    ///
    /// Cancellation is only observed between cycles, so a cycle in flight
    /// always completes. A failed startup cycle is logged regardless of the
    /// error policy.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), CycleError> {
        info!(
            "Refreshing metrics every {:.1} seconds",
            self.interval.as_secs_f64()
        );

        if let Err(e) = self.run_cycle().await {
            error!("{}", e);
        }

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Cancellation wins over a tick that became ready during a slow cycle.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Stopping metrics refresh");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.run_cycle().await {
                        Ok(()) => debug!("Metrics updated"),
                        Err(e) => {
                            error!("{}", e);
                            if self.policy == ErrorPolicy::Stop {
                                return Err(e);
                            }
                        }
                    }
                }
            }
        }
    }

    async fn run_cycle(&mut self) -> Result<(), CycleError> {
        let devices = self.source.fetch_devices().await?;
        debug!("Updating metrics for {} devices", devices.len());
        self.state.update(&devices)?;
        Ok(())
    }
}
