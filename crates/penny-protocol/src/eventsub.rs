//! Decoder for the platform's EventSub WebSocket envelopes.
//!
//! Only the envelope is handled here; owning the socket is the ingestion
//! layer's job. Notifications are turned into [`PlatformActivityData`] so they
//! can be published as `platform.activity` events.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::event_bus::{Event, PlatformActivityData};

/// Subscription types the assistant reacts to.
pub const SUBSCRIBED_EVENT_TYPES: [&str; 5] = [
    "channel.subscribe",
    "channel.raid",
    "channel.follow",
    "channel.cheer",
    "channel.subscription.gift",
];

/// Event fields copied into `details`, as (source field, detail key).
const DETAIL_FIELDS: [(&str, &str); 5] = [
    ("viewer_count", "viewer_count"),
    ("tier", "tier"),
    ("bits", "bits"),
    ("gifter_user_name", "gifter"),
    ("total", "count"),
];

/// A decoded EventSub message.
#[derive(Debug, Clone, PartialEq)]
pub enum EventSubMessage {
    /// First message on a new socket; subscriptions must be created for this session.
    Welcome { session_id: String },
    Notification {
        subscription_type: String,
        event: Map<String, Value>,
    },
    Keepalive,
    /// Reconnect/revocation and anything newer than this decoder.
    Other { message_type: String },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    metadata: Metadata,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    message_type: String,
    #[serde(default)]
    subscription_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WelcomePayload {
    session: Session,
}

#[derive(Debug, Deserialize)]
struct Session {
    id: String,
}

#[derive(Debug, Deserialize)]
struct NotificationPayload {
    #[serde(default)]
    subscription: Option<Subscription>,
    #[serde(default)]
    event: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    #[serde(rename = "type")]
    kind: String,
}

/// Decode one text frame from the EventSub socket.
pub fn decode(raw: &str) -> Result<EventSubMessage, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(raw)?;

    match envelope.metadata.message_type.as_str() {
        "session_welcome" => {
            let payload: WelcomePayload = serde_json::from_value(envelope.payload)?;
            Ok(EventSubMessage::Welcome {
                session_id: payload.session.id,
            })
        }
        "notification" => {
            let payload: NotificationPayload = serde_json::from_value(envelope.payload)?;
            let subscription_type = envelope
                .metadata
                .subscription_type
                .or_else(|| payload.subscription.map(|s| s.kind))
                .unwrap_or_default();
            Ok(EventSubMessage::Notification {
                subscription_type,
                event: payload.event,
            })
        }
        "session_keepalive" => Ok(EventSubMessage::Keepalive),
        other => Ok(EventSubMessage::Other {
            message_type: other.to_string(),
        }),
    }
}

impl EventSubMessage {
    /// Convert a notification into activity data. Other messages yield `None`.
    pub fn into_activity(self) -> Option<PlatformActivityData> {
        let EventSubMessage::Notification {
            subscription_type,
            event,
        } = self
        else {
            return None;
        };

        // Raids carry the raiding broadcaster instead of a user.
        let username = ["user_name", "from_broadcaster_user_name"]
            .iter()
            .find_map(|field| event.get(*field).and_then(Value::as_str))
            .map(str::to_string);

        let mut details = Map::new();
        for (field, key) in DETAIL_FIELDS {
            match event.get(field) {
                Some(Value::Null) | None => {}
                Some(value) => {
                    details.insert(key.to_string(), value.clone());
                }
            }
        }

        Some(PlatformActivityData {
            event_type: subscription_type,
            username,
            details,
        })
    }

    /// Convenience for ingestion loops: decode straight into a bus event.
    pub fn into_event(self) -> Option<Event> {
        self.into_activity().map(Event::PlatformActivity)
    }
}
