pub mod component;
pub mod config;
pub mod error;
pub mod manager;
pub mod signal;
pub mod strategy;
pub mod worker;

pub use component::{Component, ComponentFn, ComponentRef};
pub use config::{ConductorConfig, ManagerConfig, WorkerConfig};
pub use error::{ComponentError, ConductorError, ErrorSet, Result};
pub use manager::{all, Manager, ManagerBuilder, ManagerState};
pub use signal::StartSignal;
pub use strategy::{GracePeriod, Strategy, DEFAULT_MAX_START_WAIT};
pub use worker::Worker;
