use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ComponentError;
use crate::signal::StartSignal;

/// Long-running unit of work supervised by a [`Manager`](crate::Manager).
///
/// `run` must not return until either `ctx` is cancelled and the component has
/// finished its own teardown, or an unrecoverable error occurs. Returning early
/// without regard to `ctx` breaks the contract.
///
/// Under ordered startup the manager waits for `started` to be declared before
/// starting the next component. Under concurrent startup nobody waits on it and
/// declaring is a harmless no-op.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use conductor::{Component, ComponentError, StartSignal};
/// use tokio_util::sync::CancellationToken;
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Component for Heartbeat {
///     fn name(&self) -> &str { "heartbeat" }
///
///     async fn run(&self, ctx: CancellationToken, started: StartSignal) -> Result<(), ComponentError> {
///         started.declare_started();
///         ctx.cancelled().await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn run(&self, ctx: CancellationToken, started: StartSignal) -> Result<(), ComponentError>;
}

/// Shared handle to a component.
pub type ComponentRef = Arc<dyn Component>;

#[async_trait]
impl<C: Component + ?Sized> Component for Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn run(&self, ctx: CancellationToken, started: StartSignal) -> Result<(), ComponentError> {
        (**self).run(ctx, started).await
    }
}

/// Component backed by a closure.
///
/// The closure is invoked once per run and must honor the same blocking
/// contract as [`Component::run`].
pub struct ComponentFn<F> {
    name: String,
    f: F,
}

impl<F, Fut> ComponentFn<F>
where
    F: Fn(CancellationToken, StartSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ComponentError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    pub fn arc(name: impl Into<String>, f: F) -> ComponentRef {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Component for ComponentFn<F>
where
    F: Fn(CancellationToken, StartSignal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ComponentError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken, started: StartSignal) -> Result<(), ComponentError> {
        (self.f)(ctx, started).await
    }
}
