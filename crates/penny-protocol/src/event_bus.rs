//! Structured event bus message definitions.
//!
//! Every event is a tagged value: the tag is its [`EventKind`], the payload is
//! fixed per kind. The serialized form follows `{"kind": "<category>.<action>", "data": {...}}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Event Kind
// ============================================================================

/// Subscription key of the bus. Matching is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "chat.message")]
    InboundMessage,
    #[serde(rename = "platform.activity")]
    PlatformActivity,
    #[serde(rename = "search.requested")]
    SearchRequest,
    #[serde(rename = "search.completed")]
    SearchResult,
    #[serde(rename = "ai.query")]
    AiQuery,
    #[serde(rename = "speech.requested")]
    SpeakRequest,
    #[serde(rename = "log.notice")]
    LogNotice,
    #[serde(rename = "system.shutdown")]
    Shutdown,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::InboundMessage,
        EventKind::PlatformActivity,
        EventKind::SearchRequest,
        EventKind::SearchResult,
        EventKind::AiQuery,
        EventKind::SpeakRequest,
        EventKind::LogNotice,
        EventKind::Shutdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::InboundMessage => "chat.message",
            EventKind::PlatformActivity => "platform.activity",
            EventKind::SearchRequest => "search.requested",
            EventKind::SearchResult => "search.completed",
            EventKind::AiQuery => "ai.query",
            EventKind::SpeakRequest => "speech.requested",
            EventKind::LogNotice => "log.notice",
            EventKind::Shutdown => "system.shutdown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Ingestion Data Structures
// ============================================================================

/// Data for chat.message - a chat line seen by the ingestion layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessageData {
    /// Display name of the chatter.
    pub username: String,
    /// Raw message text, untrimmed.
    pub text: String,
    /// Which ingestion path produced the message (e.g. "twitch_chat").
    pub platform_source: String,
}

/// Data for platform.activity - follow, raid, subscription, cheer and friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformActivityData {
    /// Platform event type, e.g. "channel.raid".
    pub event_type: String,
    /// User that triggered the activity, absent for anonymous events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Event-specific details (viewer count, tier, bits, ...).
    #[serde(default)]
    pub details: Map<String, Value>,
}

// ============================================================================
// Search Data Structures
// ============================================================================

/// Data for search.requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequestData {
    pub query: String,
    /// Origin tag echoed back in the result so the requester can recognise it.
    pub source: String,
    pub requester: String,
}

/// A single search hit. Every field is optional because search backends vary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Data for search.completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultData {
    pub query: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Reaction Data Structures
// ============================================================================

/// Data for ai.query - a prompt for the LLM collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiQueryData {
    pub instruction: String,
    pub input_text: String,
}

/// Data for speech.requested - text to be spoken by the TTS collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakRequestData {
    pub text: String,
}

/// Severity of a [`LogNoticeData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Debug => "debug",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }
}

/// Data for log.notice - an operator-facing log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogNoticeData {
    pub text: String,
    #[serde(default)]
    pub level: NoticeLevel,
}

// ============================================================================
// Event
// ============================================================================

/// Immutable tagged value broadcast through the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Event {
    #[serde(rename = "chat.message")]
    InboundMessage(InboundMessageData),
    #[serde(rename = "platform.activity")]
    PlatformActivity(PlatformActivityData),
    #[serde(rename = "search.requested")]
    SearchRequest(SearchRequestData),
    #[serde(rename = "search.completed")]
    SearchResult(SearchResultData),
    #[serde(rename = "ai.query")]
    AiQuery(AiQueryData),
    #[serde(rename = "speech.requested")]
    SpeakRequest(SpeakRequestData),
    #[serde(rename = "log.notice")]
    LogNotice(LogNoticeData),
    #[serde(rename = "system.shutdown")]
    ShutdownSignal,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::InboundMessage(_) => EventKind::InboundMessage,
            Event::PlatformActivity(_) => EventKind::PlatformActivity,
            Event::SearchRequest(_) => EventKind::SearchRequest,
            Event::SearchResult(_) => EventKind::SearchResult,
            Event::AiQuery(_) => EventKind::AiQuery,
            Event::SpeakRequest(_) => EventKind::SpeakRequest,
            Event::LogNotice(_) => EventKind::LogNotice,
            Event::ShutdownSignal => EventKind::Shutdown,
        }
    }

    pub fn inbound_message(
        username: impl Into<String>,
        text: impl Into<String>,
        platform_source: impl Into<String>,
    ) -> Self {
        Event::InboundMessage(InboundMessageData {
            username: username.into(),
            text: text.into(),
            platform_source: platform_source.into(),
        })
    }

    pub fn speak(text: impl Into<String>) -> Self {
        Event::SpeakRequest(SpeakRequestData { text: text.into() })
    }

    pub fn notice(level: NoticeLevel, text: impl Into<String>) -> Self {
        Event::LogNotice(LogNoticeData {
            text: text.into(),
            level,
        })
    }

    pub fn ai_query(instruction: impl Into<String>, input_text: impl Into<String>) -> Self {
        Event::AiQuery(AiQueryData {
            instruction: instruction.into(),
            input_text: input_text.into(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
