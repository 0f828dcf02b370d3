use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default upper bound for a single component to declare itself started
/// under [`Strategy::Ordered`].
pub const DEFAULT_MAX_START_WAIT: Duration = Duration::from_secs(5 * 60);

/// Order in which the manager starts and stops its components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Start every component at once and stop them in any order.
    #[default]
    Concurrent,
    /// Start components one at a time in registration order, waiting for each
    /// to declare itself started (or for the max start wait to elapse), and
    /// stop them in reverse order.
    Ordered,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Concurrent => write!(f, "concurrent"),
            Strategy::Ordered => write!(f, "ordered"),
        }
    }
}

/// Time allowed for all components to return once shutdown began
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GracePeriod {
    /// Wait as long as it takes.
    #[default]
    Unbounded,
    Bounded(Duration),
}

impl GracePeriod {
    /// A zero duration means "no timeout".
    pub fn from_timeout(timeout: Duration) -> Self {
        if timeout.is_zero() {
            GracePeriod::Unbounded
        } else {
            GracePeriod::Bounded(timeout)
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            GracePeriod::Unbounded => None,
            GracePeriod::Bounded(d) => Some(*d),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, GracePeriod::Unbounded)
    }
}

impl From<Duration> for GracePeriod {
    fn from(timeout: Duration) -> Self {
        Self::from_timeout(timeout)
    }
}

impl fmt::Display for GracePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GracePeriod::Unbounded => write!(f, "unbounded"),
            GracePeriod::Bounded(d) => write!(f, "{:?}", d),
        }
    }
}
