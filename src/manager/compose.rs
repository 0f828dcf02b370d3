use super::orchestrator::Manager;
use crate::component::{Component, ComponentRef};
use crate::error::ComponentError;
use crate::signal::StartSignal;
use crate::strategy::GracePeriod;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Build a concurrent manager with the given grace period and components.
///
/// The returned manager is itself a [`Component`], so the group can be added
/// to an outer manager. Inner and outer grace periods are independent.
pub fn all<I>(grace: impl Into<GracePeriod>, components: I) -> Manager
where
    I: IntoIterator<Item = ComponentRef>,
{
    let mut manager = Manager::builder().name("group").grace_period(grace.into()).build();
    // A fresh manager is idle, so registration cannot be rejected.
    manager.registry.get_mut().components.extend(components);
    manager
}

/// A nested manager runs its own group on the outer token and declares itself
/// started once every inner component has been dispatched.
#[async_trait]
impl Component for Manager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken, started: StartSignal) -> Result<(), ComponentError> {
        self.run_with_signal(ctx, Some(started))
            .await
            .map_err(|e| ComponentError::Failed(e.into()))
    }
}
