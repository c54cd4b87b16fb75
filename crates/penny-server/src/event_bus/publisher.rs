use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::FutureExt;
use tokio::sync::RwLock;
use tracing::{debug, error, trace};

use super::subscriber::{Handler, Subscription, SubscriptionId};
use super::{Event, EventKind};

/// Event Bus
///
/// Delivers each published event to every handler subscribed to its kind.
///
/// - Fan-out is concurrent: all handlers for one publish are polled together
///   and `publish` returns once every one of them finished or failed.
/// - A failing or panicking handler is logged and isolated; siblings still
///   run and the publisher never sees the failure.
/// - The subscriber table lock is released before handlers run, so handlers
///   may publish, subscribe or unsubscribe themselves.
pub struct EventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for events of `kind`
    ///
    /// Registering the same handler twice creates two independent entries.
    pub async fn subscribe<F, Fut>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler = Arc::new(move |event| handler(event).boxed());

        self.subscribers
            .write()
            .await
            .entry(kind)
            .or_default()
            .push(Subscription { id, handler });

        debug!(kind = %kind, subscription = %id, "subscribed");
        id
    }

    /// Remove a registration
    ///
    /// Returns `false` when the id was already removed.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().await;

        for (kind, subs) in subscribers.iter_mut() {
            if let Some(pos) = subs.iter().position(|s| s.id == id) {
                subs.remove(pos);
                debug!(kind = %kind, subscription = %id, "unsubscribed");
                return true;
            }
        }

        false
    }

    /// Publish an event to all current subscribers of its kind
    pub async fn publish(&self, event: Event) {
        let kind = event.kind();

        // Snapshot the handlers so the lock is not held across handler calls
        let handlers: Vec<(SubscriptionId, Handler)> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .get(&kind)
                .map(|subs| subs.iter().map(|s| (s.id, s.handler.clone())).collect())
                .unwrap_or_default()
        };

        if handlers.is_empty() {
            trace!(kind = %kind, "no subscribers");
            return;
        }

        trace!(kind = %kind, handlers = handlers.len(), "publishing event");

        let dispatches = handlers.into_iter().map(|(id, handler)| {
            let event = event.clone();
            async move {
                // Calling the handler inside the guarded future also catches
                // panics raised before its first await.
                let outcome = AssertUnwindSafe(async move { handler(event).await })
                    .catch_unwind()
                    .await;

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        error!(kind = %kind, subscription = %id, error = %e, "event handler failed");
                    }
                    Err(panic) => {
                        error!(
                            kind = %kind,
                            subscription = %id,
                            panic = %panic_message(panic.as_ref()),
                            "event handler panicked"
                        );
                    }
                }
            }
        });

        join_all(dispatches).await;
    }

    /// Check if there are any subscribers for a given kind
    pub async fn has_subscribers(&self, kind: EventKind) -> bool {
        self.subscriber_count(kind).await > 0
    }

    /// Get the number of subscribers for a given kind
    pub async fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .await
            .get(&kind)
            .map_or(0, |subs| subs.len())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use penny_protocol::NoticeLevel;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Mutex;

    fn counting_handler(
        counter: Arc<AtomicUsize>,
    ) -> impl Fn(Event) -> futures_util::future::Ready<anyhow::Result<()>> + Send + Sync + 'static
    {
        move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(Event::speak("nobody listens")).await;
        assert!(!bus.has_subscribers(EventKind::SpeakRequest).await);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_identical_event() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..3 {
            let seen = seen.clone();
            bus.subscribe(EventKind::SpeakRequest, move |event| {
                let seen = seen.clone();
                async move {
                    seen.lock().await.push(event);
                    Ok(())
                }
            })
            .await;
        }

        let event = Event::speak("hello chat");
        bus.publish(event.clone()).await;

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|e| *e == event));
    }

    #[tokio::test]
    async fn test_kind_matching_is_exact() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::AiQuery, counting_handler(counter.clone()))
            .await;

        bus.publish(Event::speak("not for you")).await;
        bus.publish(Event::notice(NoticeLevel::Info, "nor this")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        bus.publish(Event::ai_query("User x asked:", "why")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_creates_independent_entries() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let first = bus
            .subscribe(EventKind::SpeakRequest, counting_handler(counter.clone()))
            .await;
        let second = bus
            .subscribe(EventKind::SpeakRequest, counting_handler(counter.clone()))
            .await;
        assert_ne!(first, second);

        bus.publish(Event::speak("twice")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        assert!(bus.unsubscribe(first).await);
        bus.publish(Event::speak("once")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unsubscribe_twice_is_noop() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = bus
            .subscribe(EventKind::Shutdown, counting_handler(counter.clone()))
            .await;

        assert!(bus.unsubscribe(id).await);
        assert!(!bus.unsubscribe(id).await);

        bus.publish(Event::ShutdownSignal).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(EventKind::Shutdown).await, 0);
    }

    #[tokio::test]
    async fn test_failing_handler_is_isolated() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        bus.subscribe(EventKind::SpeakRequest, counting_handler(counter.clone()))
            .await;
        bus.subscribe(EventKind::SpeakRequest, |_event| async {
            Err(anyhow::anyhow!("tts backend unavailable"))
        })
        .await;
        bus.subscribe(EventKind::SpeakRequest, |event| async move {
            if event.kind() == EventKind::SpeakRequest {
                panic!("handler bug");
            }
            Ok(())
        })
        .await;
        bus.subscribe(EventKind::SpeakRequest, counting_handler(counter.clone()))
            .await;

        bus.publish(Event::speak("still delivered")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_publish_waits_for_all_handlers() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for delay in [30u64, 10, 20] {
            let counter = counter.clone();
            bus.subscribe(EventKind::AiQuery, move |_event| {
                let counter = counter.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;
        }

        bus.publish(Event::ai_query("i", "t")).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fan_out_is_concurrent() {
        let bus = EventBus::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(Mutex::new(Some(rx)));
        let tx = Arc::new(Mutex::new(Some(tx)));

        // First handler waits for the second; sequential dispatch would deadlock.
        bus.subscribe(EventKind::SpeakRequest, move |_event| {
            let rx = rx.clone();
            async move {
                if let Some(rx) = rx.lock().await.take() {
                    rx.await?;
                }
                Ok(())
            }
        })
        .await;
        bus.subscribe(EventKind::SpeakRequest, move |_event| {
            let tx = tx.clone();
            async move {
                if let Some(tx) = tx.lock().await.take() {
                    let _ = tx.send(());
                }
                Ok(())
            }
        })
        .await;

        tokio::time::timeout(Duration::from_secs(1), bus.publish(Event::speak("go")))
            .await
            .expect("fan-out should not serialize handlers");
    }

    #[tokio::test]
    async fn test_handler_can_publish_and_unsubscribe() {
        let bus = Arc::new(EventBus::new());
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::SpeakRequest, counting_handler(counter.clone()))
            .await;

        let relay_bus = bus.clone();
        let own_id = Arc::new(Mutex::new(None));
        let own_id_handle = own_id.clone();
        let id = bus
            .subscribe(EventKind::AiQuery, move |_event| {
                let bus = relay_bus.clone();
                let own_id = own_id_handle.clone();
                async move {
                    bus.publish(Event::speak("relayed")).await;
                    if let Some(id) = *own_id.lock().await {
                        bus.unsubscribe(id).await;
                    }
                    Ok(())
                }
            })
            .await;
        *own_id.lock().await = Some(id);

        bus.publish(Event::ai_query("i", "t")).await;
        bus.publish(Event::ai_query("i", "t")).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!bus.has_subscribers(EventKind::AiQuery).await);
    }
}
