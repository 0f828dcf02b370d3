use crate::error::ComponentError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Drains the component error queue during shutdown.
///
/// Errors are kept in arrival order, which is the order in which components
/// finished. Nothing about that order is deterministic.
pub(super) struct ErrorAggregator {
    collected: Arc<Mutex<Vec<ComponentError>>>,
    handle: JoinHandle<()>,
}

impl ErrorAggregator {
    pub(super) fn spawn(mut errors: mpsc::Receiver<ComponentError>) -> Self {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);

        let handle = tokio::spawn(async move {
            while let Some(err) = errors.recv().await {
                debug!("Collected shutdown error: {}", err);
                sink.lock().push(err);
            }
        });

        Self { collected, handle }
    }

    /// Errors received so far. Later arrivals are still collected but will
    /// not show up in this result.
    pub(super) fn take(&self) -> Vec<ComponentError> {
        std::mem::take(&mut *self.collected.lock())
    }

    /// Wait for every sender to be dropped and return all errors.
    pub(super) async fn finish(self) -> Vec<ComponentError> {
        if let Err(e) = self.handle.await {
            error!("Error aggregation task failed: {}", e);
        }
        std::mem::take(&mut *self.collected.lock())
    }
}
