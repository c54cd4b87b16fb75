// Event Bus
//
// In-process publish/subscribe hub. Ingestion publishes inbound events, the
// command router and the reaction collaborators subscribe by kind and publish
// their follow-up intents back onto the same bus.

pub mod publisher;
pub mod subscriber;

pub use penny_protocol::{Event, EventKind};
pub use publisher::EventBus;
pub use subscriber::{Handler, HandlerFuture, SubscriptionId};
