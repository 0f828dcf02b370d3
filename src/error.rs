use std::fmt;
use thiserror::Error;

use crate::strategy::GracePeriod;

/// Errors returned by the [`Manager`](crate::Manager).
#[derive(Error, Debug)]
pub enum ConductorError {
    #[error("can't accept new component as manager has already started")]
    AlreadyStarted,

    #[error("can't accept new component as stop procedure is already engaged")]
    AlreadyStopping,

    /// A component failed while the group was running.
    #[error("{0}")]
    ComponentFailure(#[source] ComponentError),

    /// One or more components returned an error during teardown.
    #[error("{0}")]
    Shutdown(ErrorSet),

    /// Not every component returned before the grace period elapsed.
    #[error("not all components were shutdown completely within grace period ({grace})")]
    ShutdownTimeout { grace: GracePeriod, errors: ErrorSet },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ConductorError {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConductorError::AlreadyStarted => "registration_already_started",
            ConductorError::AlreadyStopping => "registration_already_stopping",
            ConductorError::ComponentFailure(_) => "component_failure",
            ConductorError::Shutdown(_) => "shutdown_error",
            ConductorError::ShutdownTimeout { .. } => "shutdown_timeout",
            ConductorError::Config(_) => "config",
        }
    }

    /// `true` when `add` was called too late.
    pub fn is_registration_rejected(&self) -> bool {
        matches!(
            self,
            ConductorError::AlreadyStarted | ConductorError::AlreadyStopping
        )
    }

    /// Component errors carried by this error, in the order they were recorded.
    pub fn component_errors(&self) -> Vec<&ComponentError> {
        match self {
            ConductorError::ComponentFailure(err) => vec![err],
            ConductorError::Shutdown(set) => set.iter().collect(),
            ConductorError::ShutdownTimeout { errors, .. } => errors.iter().collect(),
            _ => Vec::new(),
        }
    }
}

/// Error returned by a [`Component`](crate::Component).
#[derive(Error, Debug)]
pub enum ComponentError {
    /// The component stopped because its token was cancelled. Never reported
    /// as a failure.
    #[error("component cancelled")]
    Canceled,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl ComponentError {
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::Failed(anyhow::Error::msg(message))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, ComponentError::Canceled)
    }
}

/// Errors joined in the order they were received.
///
/// During shutdown this is arrival order, i.e. the order in which components
/// finished. That order depends on scheduling and is not stable across runs.
#[derive(Debug, Default)]
pub struct ErrorSet {
    errors: Vec<ComponentError>,
}

impl ErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: ComponentError) {
        self.errors.push(err);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<ComponentError> {
        self.errors
    }
}

impl Extend<ComponentError> for ErrorSet {
    fn extend<I: IntoIterator<Item = ComponentError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl From<Vec<ComponentError>> for ErrorSet {
    fn from(errors: Vec<ComponentError>) -> Self {
        Self { errors }
    }
}

impl fmt::Display for ErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => return write!(f, "no errors occurred"),
            1 => writeln!(f, "1 error occurred:")?,
            n => writeln!(f, "{} errors occurred:", n)?,
        }
        for err in &self.errors {
            writeln!(f, "\t* {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorSet {}

pub type Result<T> = std::result::Result<T, ConductorError>;
