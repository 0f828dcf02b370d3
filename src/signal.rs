//! Start-signal barrier used by ordered startup.
//!
//! A component started under [`Strategy::Ordered`](crate::Strategy::Ordered)
//! receives a [`StartSignal`] and calls [`StartSignal::declare_started`] once it
//! has finished initializing. The manager waits on the same signal before
//! starting the next component. A component that never declares is still
//! valid: the manager falls back to its max start wait.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::trace;

/// One-shot readiness flag shared between a component and its manager.
///
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone)]
pub struct StartSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StartSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Mark the component as started. Only the first call has an effect.
    pub fn declare_started(&self) {
        let flipped = self.tx.send_if_modified(|started| {
            if *started {
                false
            } else {
                *started = true;
                true
            }
        });
        if flipped {
            trace!("Start signal declared");
        }
    }

    pub fn is_started(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal is declared or `timeout` elapses.
    ///
    /// Returns `true` if the component declared itself started, `false` on
    /// timeout. A timeout is not an error.
    pub async fn wait_started(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so `wait_for` can only fail on timeout.
        let declared = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|started| *started)).await,
            Ok(Ok(_))
        );
        declared
    }
}

impl Default for StartSignal {
    fn default() -> Self {
        Self::new()
    }
}
