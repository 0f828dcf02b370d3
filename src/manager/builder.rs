use super::orchestrator::Manager;
use crate::config::ManagerConfig;
use crate::strategy::{GracePeriod, Strategy, DEFAULT_MAX_START_WAIT};
use std::time::Duration;

/// Builder for [`Manager`]
pub struct ManagerBuilder {
    name: String,
    strategy: Strategy,
    grace: GracePeriod,
    max_start_wait: Duration,
}

impl ManagerBuilder {
    pub fn new() -> Self {
        Self {
            name: "manager".to_string(),
            strategy: Strategy::default(),
            grace: GracePeriod::default(),
            max_start_wait: DEFAULT_MAX_START_WAIT,
        }
    }

    /// Name used in logs and when the manager is nested as a component.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shutdown grace period as a duration; zero means no timeout.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.grace = GracePeriod::from_timeout(timeout);
        self
    }

    pub fn grace_period(mut self, grace: GracePeriod) -> Self {
        self.grace = grace;
        self
    }

    /// Upper bound on waiting for each component to declare itself started.
    /// Only used by [`Strategy::Ordered`].
    pub fn max_start_wait(mut self, wait: Duration) -> Self {
        self.max_start_wait = wait;
        self
    }

    /// Apply every setting from a loaded configuration.
    pub fn config(self, config: &ManagerConfig) -> Self {
        self.strategy(config.strategy)
            .shutdown_timeout(Duration::from_secs(config.shutdown_timeout_seconds))
            .max_start_wait(Duration::from_secs(config.max_start_wait_seconds))
    }

    pub fn build(self) -> Manager {
        Manager::with_settings(self.name, self.strategy, self.grace, self.max_start_wait)
    }
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
