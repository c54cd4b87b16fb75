use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use super::Event;

/// Future returned by a subscribed handler
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Type-erased event handler
///
/// Handlers receive their own clone of the published event.
pub type Handler = Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>;

/// Opaque handle returned by [`EventBus::subscribe`](super::EventBus::subscribe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One registration on the bus. Position in the per-kind list is the
/// registration order.
pub(crate) struct Subscription {
    pub id: SubscriptionId,
    pub handler: Handler,
}
