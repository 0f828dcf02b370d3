use super::orchestrator::Manager;
use super::stack::CancelStack;
use super::state::ManagerState;
use crate::component::ComponentRef;
use crate::error::{ComponentError, ConductorError, Result};
use crate::signal::StartSignal;
use crate::strategy::Strategy;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-run state, created when `run` begins and dropped when it returns.
pub(super) struct ActiveRun {
    /// Parent of every component token.
    pub(super) internal: CancellationToken,
    /// One supervising task per started component.
    pub(super) tasks: JoinSet<()>,
    /// Ordered strategy only.
    pub(super) stack: CancelStack,
    pub(super) errors_tx: mpsc::Sender<ComponentError>,
    pub(super) errors_rx: mpsc::Receiver<ComponentError>,
}

impl ActiveRun {
    fn new(internal: CancellationToken, components: usize) -> Self {
        // Every component reports at most one error, so sends never block.
        let (errors_tx, errors_rx) = mpsc::channel(components.max(1));
        Self {
            internal,
            tasks: JoinSet::new(),
            stack: CancelStack::new(),
            errors_tx,
            errors_rx,
        }
    }
}

impl Manager {
    /// Start all registered components and block until `ctx` is cancelled or
    /// a component fails, then run the stop protocol.
    ///
    /// Cancelling `ctx` alone never produces an error. The result is an error
    /// only when a component failed, a component returned an error during
    /// teardown, or the grace period elapsed before every component returned.
    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        self.run_with_signal(ctx, None).await
    }

    /// Same as [`Manager::run`], declaring `started` once every component has
    /// been dispatched. Used when the manager is nested as a component.
    pub(super) async fn run_with_signal(
        &self,
        ctx: CancellationToken,
        started: Option<StartSignal>,
    ) -> Result<()> {
        let components = self.begin()?;
        info!(
            "Manager '{}' starting {} component(s) with {} strategy",
            self.name,
            components.len(),
            self.strategy
        );

        let internal = match self.strategy {
            Strategy::Concurrent => ctx.child_token(),
            // Ordered components are cancelled one at a time by the stop
            // protocol and must not see the caller's cancellation directly.
            Strategy::Ordered => CancellationToken::new(),
        };
        let _guard = internal.clone().drop_guard();
        let mut run = ActiveRun::new(internal, components.len());

        let trigger = {
            let starting = self.start_components(
                &components,
                &run.internal,
                &mut run.tasks,
                &mut run.stack,
                &run.errors_tx,
                started.as_ref(),
            );
            tokio::pin!(starting);
            let mut dispatched = false;

            loop {
                tokio::select! {
                    biased;
                    _ = ctx.cancelled() => {
                        info!("Manager '{}' received cancellation", self.name);
                        break None;
                    }
                    Some(err) = run.errors_rx.recv() => {
                        error!("Manager '{}' component failed: {}", self.name, err);
                        break Some(err);
                    }
                    _ = &mut starting, if !dispatched => {
                        dispatched = true;
                    }
                    else => break None,
                }
            }
        };

        self.stop(run, trigger).await
    }

    /// Move to `Started` and snapshot the registered components.
    fn begin(&self) -> Result<Vec<ComponentRef>> {
        let mut registry = self.registry.lock();
        if registry.state != ManagerState::Idle {
            return Err(ConductorError::AlreadyStarted);
        }
        registry.advance(ManagerState::Started);
        Ok(registry.components.clone())
    }

    async fn start_components(
        &self,
        components: &[ComponentRef],
        internal: &CancellationToken,
        tasks: &mut JoinSet<()>,
        stack: &mut CancelStack,
        errors: &mpsc::Sender<ComponentError>,
        started: Option<&StartSignal>,
    ) {
        match self.strategy {
            Strategy::Concurrent => {
                for component in components {
                    spawn_component(
                        tasks,
                        component.clone(),
                        internal.clone(),
                        StartSignal::new(),
                        errors.clone(),
                    );
                }
            }
            Strategy::Ordered => {
                for component in components {
                    let token = internal.child_token();
                    let signal = StartSignal::new();
                    spawn_component(
                        tasks,
                        component.clone(),
                        token.clone(),
                        signal.clone(),
                        errors.clone(),
                    );
                    stack.push(component.name(), token);

                    if signal.wait_started(self.max_start_wait).await {
                        debug!("Component '{}' declared itself started", component.name());
                    } else {
                        warn!(
                            "Component '{}' did not declare start within {:?}, continuing",
                            component.name(),
                            self.max_start_wait
                        );
                    }
                }
            }
        }

        info!(
            "Manager '{}' dispatched all {} component(s)",
            self.name,
            components.len()
        );
        if let Some(started) = started {
            started.declare_started();
        }
    }
}

/// Spawn the supervising task for one component.
///
/// The component runs in its own task so a panic is reported as a failure
/// instead of silently ending the supervising task. Cancellation results are
/// dropped here and never reach the error queue.
fn spawn_component(
    tasks: &mut JoinSet<()>,
    component: ComponentRef,
    ctx: CancellationToken,
    started: StartSignal,
    errors: mpsc::Sender<ComponentError>,
) {
    let name = component.name().to_string();
    tasks.spawn(async move {
        debug!("Component '{}' starting", name);
        let handle = tokio::spawn(async move { component.run(ctx, started).await });

        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(ComponentError::msg(format!(
                "component '{}' panicked: {}",
                name, e
            ))),
        };

        match result {
            Ok(()) => debug!("Component '{}' exited", name),
            Err(ComponentError::Canceled) => debug!("Component '{}' exited on cancellation", name),
            Err(e) => {
                warn!("Component '{}' returned error: {}", name, e);
                if errors.send(e).await.is_err() {
                    error!("Error queue closed before component '{}' reported", name);
                }
            }
        }
    });
}
