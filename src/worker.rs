use crate::component::Component;
use crate::config::WorkerConfig;
use crate::error::ComponentError;
use crate::signal::StartSignal;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configurable background worker used by the `conductor` binary.
///
/// Simulates initialization, periodic work, an optional deliberate failure
/// and a slow teardown, which is enough to exercise every manager path.
pub struct Worker {
    config: WorkerConfig,
    ticks: Arc<AtomicU64>,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of ticks performed so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Shared tick counter, readable after the worker was handed to a manager
    pub fn tick_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.ticks)
    }

    async fn work(&self, ctx: &CancellationToken) -> Result<(), ComponentError> {
        let mut ticker = interval(Duration::from_millis(self.config.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let failure = async {
            match self.config.fail_after_ms {
                Some(ms) => sleep(Duration::from_millis(ms)).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(failure);

        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                _ = &mut failure => {
                    warn!("Worker '{}' failing on purpose", self.config.name);
                    return Err(ComponentError::msg(format!(
                        "worker '{}' failed after {} ms",
                        self.config.name,
                        self.config.fail_after_ms.unwrap_or_default()
                    )));
                }
                _ = ticker.tick() => {
                    let n = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!("Worker '{}' tick {}", self.config.name, n);
                }
            }
        }
    }
}

#[async_trait]
impl Component for Worker {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn run(&self, ctx: CancellationToken, started: StartSignal) -> Result<(), ComponentError> {
        if self.config.startup_delay_ms > 0 {
            tokio::select! {
                _ = ctx.cancelled() => return Err(ComponentError::Canceled),
                _ = sleep(Duration::from_millis(self.config.startup_delay_ms)) => {}
            }
        }
        started.declare_started();
        info!("Worker '{}' started", self.config.name);

        self.work(&ctx).await?;

        if self.config.shutdown_delay_ms > 0 {
            debug!(
                "Worker '{}' tearing down for {} ms",
                self.config.name, self.config.shutdown_delay_ms
            );
            sleep(Duration::from_millis(self.config.shutdown_delay_ms)).await;
        }
        info!("Worker '{}' stopped after {} ticks", self.config.name, self.ticks());
        Ok(())
    }
}
