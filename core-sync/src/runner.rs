//! # Continuous Runner
//!
//! Repeats the sync pipeline until shutdown is requested.
//!
//! Every run performs cleanup. After a successful run the runner waits the
//! sync interval; after a failed one it waits the shorter retry backoff. A
//! shutdown request interrupts the wait but never an in-flight run.

use crate::pipeline::SyncPipeline;
use core_runtime::events::{CoreEvent, EventBus, RunnerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

pub struct ContinuousRunner {
    pipeline: Arc<SyncPipeline>,
    event_bus: Arc<EventBus>,
    interval: Duration,
    retry_backoff: Duration,
}

impl ContinuousRunner {
    /// Runner using the interval and backoff from the pipeline's config.
    pub fn new(pipeline: Arc<SyncPipeline>, event_bus: Arc<EventBus>) -> Self {
        let interval = pipeline.config().sync_interval;
        let retry_backoff = pipeline.config().retry_backoff;

        Self {
            pipeline,
            event_bus,
            interval,
            retry_backoff,
        }
    }

    pub fn with_timing(mut self, interval: Duration, retry_backoff: Duration) -> Self {
        self.interval = interval;
        self.retry_backoff = retry_backoff;
        self
    }

    /// Loop until `shutdown` is cancelled. Returns the number of runs started.
    #[instrument(skip_all, fields(interval_ms = self.interval.as_millis() as u64))]
    pub async fn run(&self, shutdown: CancellationToken) -> u64 {
        let mut runs = 0u64;
        info!("Continuous sync started");

        while !shutdown.is_cancelled() {
            runs += 1;
            self.event_bus
                .emit(CoreEvent::Runner(RunnerEvent::Scheduled { iteration: runs }))
                .ok();

            let wait = match self.pipeline.run(true).await {
                Ok(_) => self.interval,
                Err(e) => {
                    warn!(
                        "Run {} failed, retrying in {}ms: {}",
                        runs,
                        self.retry_backoff.as_millis(),
                        e
                    );
                    self.event_bus
                        .emit(CoreEvent::Runner(RunnerEvent::RunFailed {
                            iteration: runs,
                            message: e.to_string(),
                            retry_in_ms: self.retry_backoff.as_millis() as u64,
                        }))
                        .ok();
                    self.retry_backoff
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        info!("Continuous sync stopped after {} runs", runs);
        self.event_bus
            .emit(CoreEvent::Runner(RunnerEvent::Stopped { runs }))
            .ok();
        runs
    }
}
