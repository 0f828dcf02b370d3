use crate::component::ComponentRef;
use crate::error::{ConductorError, Result};
use std::fmt;

/// Manager lifecycle states. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ManagerState {
    Idle,
    Started,
    Stopping,
    Stopped,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ManagerState::Idle => "idle",
            ManagerState::Started => "started",
            ManagerState::Stopping => "stopping",
            ManagerState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Registered components and lifecycle state, guarded by the manager's lock.
pub(super) struct Registry {
    pub(super) components: Vec<ComponentRef>,
    pub(super) state: ManagerState,
}

impl Registry {
    pub(super) fn new() -> Self {
        Self {
            components: Vec::new(),
            state: ManagerState::Idle,
        }
    }

    pub(super) fn register(&mut self, component: ComponentRef) -> Result<()> {
        match self.state {
            ManagerState::Idle => {
                self.components.push(component);
                Ok(())
            }
            ManagerState::Started => Err(ConductorError::AlreadyStarted),
            ManagerState::Stopping | ManagerState::Stopped => Err(ConductorError::AlreadyStopping),
        }
    }

    /// Move to `next` unless the registry is already at or past it.
    pub(super) fn advance(&mut self, next: ManagerState) {
        if next > self.state {
            self.state = next;
        }
    }
}
