use crate::strategy::Strategy;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ConductorConfig {
    #[serde(default)]
    pub manager: ManagerConfig,

    #[serde(default)]
    pub workers: Vec<WorkerConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Startup strategy ("concurrent" or "ordered")
    #[serde(default)]
    pub strategy: Strategy,

    /// Shutdown grace period in seconds (0 = wait indefinitely)
    #[serde(default = "default_shutdown_timeout_seconds")]
    pub shutdown_timeout_seconds: u64,

    /// Max wait for each component to declare itself started (ordered only)
    #[serde(default = "default_max_start_wait_seconds")]
    pub max_start_wait_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Worker name used in logs
    pub name: String,

    /// Interval between ticks in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Simulated initialization time before declaring started
    #[serde(default)]
    pub startup_delay_ms: u64,

    /// Simulated teardown time after cancellation
    #[serde(default)]
    pub shutdown_delay_ms: u64,

    /// Fail on purpose after running this long (unset = never)
    #[serde(default)]
    pub fail_after_ms: Option<u64>,
}

impl ConductorConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("conductor.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env(path, environment())
    }

    /// Layer `env` over the defaults and the file at `path`.
    fn load_with_env<P: AsRef<Path>>(path: P, env: Environment) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("manager.strategy", Strategy::default().to_string())?
            .set_default(
                "manager.shutdown_timeout_seconds",
                default_shutdown_timeout_seconds(),
            )?
            .set_default(
                "manager.max_start_wait_seconds",
                default_max_start_wait_seconds(),
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            .add_source(env)
            .build()?;

        let config: ConductorConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manager.strategy == Strategy::Ordered && self.manager.max_start_wait_seconds == 0 {
            return Err(ConfigError::Message(
                "Manager max_start_wait_seconds must be greater than 0 for ordered strategy"
                    .to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for worker in &self.workers {
            if worker.name.trim().is_empty() {
                return Err(ConfigError::Message(
                    "Worker name must not be empty".to_string(),
                ));
            }

            if !seen.insert(worker.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "Duplicate worker name '{}'",
                    worker.name
                )));
            }

            if worker.tick_interval_ms == 0 {
                return Err(ConfigError::Message(format!(
                    "Worker '{}' tick_interval_ms must be greater than 0",
                    worker.name
                )));
            }
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            shutdown_timeout_seconds: default_shutdown_timeout_seconds(),
            max_start_wait_seconds: default_max_start_wait_seconds(),
        }
    }
}

impl WorkerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tick_interval_ms: default_tick_interval_ms(),
            startup_delay_ms: 0,
            shutdown_delay_ms: 0,
            fail_after_ms: None,
        }
    }
}

// Default value functions
/// `CONDUCTOR_` variables, `__` between nested keys: `CONDUCTOR_MANAGER__STRATEGY`.
fn environment() -> Environment {
    Environment::with_prefix("CONDUCTOR")
        .prefix_separator("_")
        .separator("__")
}

fn default_shutdown_timeout_seconds() -> u64 {
    30
}
fn default_max_start_wait_seconds() -> u64 {
    300
}
fn default_tick_interval_ms() -> u64 {
    1000
}
