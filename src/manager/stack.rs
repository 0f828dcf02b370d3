use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation tokens of ordered components, most recently started on top.
#[derive(Default)]
pub(super) struct CancelStack {
    entries: Vec<(String, CancellationToken)>,
}

impl CancelStack {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn push(&mut self, name: impl Into<String>, token: CancellationToken) {
        self.entries.push((name.into(), token));
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Cancel every token, last pushed first, and return the names in the
    /// order they were cancelled.
    pub(super) fn unwind(&mut self) -> Vec<String> {
        let mut order = Vec::with_capacity(self.entries.len());
        while let Some((name, token)) = self.entries.pop() {
            debug!("Cancelling component '{}'", name);
            token.cancel();
            order.push(name);
        }
        order
    }
}
