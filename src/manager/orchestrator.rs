use super::builder::ManagerBuilder;
use super::state::{ManagerState, Registry};
use crate::component::{Component, ComponentRef};
use crate::config::ManagerConfig;
use crate::error::Result;
use crate::strategy::{GracePeriod, Strategy};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Starts a group of components, supervises them and shuts them down.
///
/// Components are registered with [`Manager::add`] before [`Manager::run`] is
/// called. `run` starts them according to the [`Strategy`], blocks until the
/// caller's token is cancelled or a component fails, then cancels every
/// component and waits for them within the grace period.
///
/// A manager runs once. Build a new one for every run.
pub struct Manager {
    pub(super) name: String,
    pub(super) strategy: Strategy,
    pub(super) grace: GracePeriod,
    pub(super) max_start_wait: Duration,
    pub(super) registry: Mutex<Registry>,
}

impl Manager {
    /// Create a manager with the default settings: concurrent start,
    /// unbounded grace period.
    pub fn new() -> Self {
        ManagerBuilder::new().build()
    }

    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    pub fn from_config(config: &ManagerConfig) -> Self {
        ManagerBuilder::new().config(config).build()
    }

    pub(super) fn with_settings(
        name: String,
        strategy: Strategy,
        grace: GracePeriod,
        max_start_wait: Duration,
    ) -> Self {
        Self {
            name,
            strategy,
            grace,
            max_start_wait,
            registry: Mutex::new(Registry::new()),
        }
    }

    /// Register a component. Fails once `run` has begun or shutdown has been
    /// engaged.
    pub fn add<C: Component>(&self, component: C) -> Result<()> {
        self.add_ref(Arc::new(component))
    }

    /// Register an already shared component.
    pub fn add_ref(&self, component: ComponentRef) -> Result<()> {
        let name = component.name().to_string();
        self.registry.lock().register(component)?;
        debug!("Manager '{}' registered component '{}'", self.name, name);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ManagerState {
        self.registry.lock().state
    }

    pub fn len(&self) -> usize {
        self.registry.lock().components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn grace_period(&self) -> GracePeriod {
        self.grace
    }

    pub fn max_start_wait(&self) -> Duration {
        self.max_start_wait
    }

    pub(super) fn transition(&self, next: ManagerState) {
        let mut registry = self.registry.lock();
        registry.advance(next);
        debug!("Manager '{}' state changed to: {}", self.name, registry.state);
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}
