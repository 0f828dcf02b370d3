use super::aggregate::ErrorAggregator;
use super::orchestrator::Manager;
use super::startup::ActiveRun;
use super::state::ManagerState;
use crate::error::{ComponentError, ConductorError, ErrorSet, Result};
use crate::strategy::Strategy;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

impl Manager {
    /// Cancel every component and wait for them within the grace period.
    ///
    /// `trigger` is the failure that ended the run, if any. It is reported
    /// before any error returned during teardown.
    pub(super) async fn stop(
        &self,
        mut run: ActiveRun,
        trigger: Option<ComponentError>,
    ) -> Result<()> {
        // A grace period past the clock's range has no reachable deadline.
        let deadline = self
            .grace
            .as_duration()
            .and_then(|grace| Instant::now().checked_add(grace));
        self.transition(ManagerState::Stopping);
        info!(
            "Manager '{}' stopping {} component(s), grace period {}",
            self.name,
            run.tasks.len(),
            self.grace
        );

        match self.strategy {
            Strategy::Concurrent => run.internal.cancel(),
            Strategy::Ordered => {
                let order = run.stack.unwind();
                info!("Manager '{}' cancelled components in order: {:?}", self.name, order);
            }
        }

        let aggregator = ErrorAggregator::spawn(run.errors_rx);
        drop(run.errors_tx);

        let finished = match deadline {
            Some(deadline) => timeout_at(deadline, wait_all(&mut run.tasks)).await.is_ok(),
            None => {
                wait_all(&mut run.tasks).await;
                true
            }
        };

        if !finished {
            let stuck = run.tasks.len();
            // Tasks keep running in the background; they are not aborted.
            run.tasks.detach_all();
            self.transition(ManagerState::Stopped);
            error!(
                "Manager '{}' grace period {} exceeded with {} component(s) still running",
                self.name, self.grace, stuck
            );

            let mut errors = ErrorSet::new();
            errors.extend(trigger);
            errors.extend(aggregator.take());
            return Err(ConductorError::ShutdownTimeout {
                grace: self.grace,
                errors,
            });
        }

        self.transition(ManagerState::Stopped);
        let shutdown_errors = aggregator.finish().await;

        match (trigger, shutdown_errors.is_empty()) {
            (None, true) => {
                info!("Manager '{}' stopped cleanly", self.name);
                Ok(())
            }
            (Some(failure), true) => {
                warn!("Manager '{}' stopped after component failure", self.name);
                Err(ConductorError::ComponentFailure(failure))
            }
            (trigger, false) => {
                let mut errors = ErrorSet::new();
                errors.extend(trigger);
                errors.extend(shutdown_errors);
                warn!(
                    "Manager '{}' stopped with {} error(s)",
                    self.name,
                    errors.len()
                );
                Err(ConductorError::Shutdown(errors))
            }
        }
    }
}

async fn wait_all(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            error!("Component supervising task failed: {}", e);
        }
    }
}
