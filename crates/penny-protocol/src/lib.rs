//! Shared event vocabulary for the penny coordination core.
//!
//! Everything that travels over the in-process event bus is defined here,
//! together with the decoder for the platform's EventSub envelopes that feed
//! `platform.activity` events into the bus.

pub mod event_bus;
pub mod eventsub;

pub use event_bus::{
    AiQueryData, Event, EventKind, InboundMessageData, LogNoticeData, NoticeLevel,
    PlatformActivityData, SearchHit, SearchRequestData, SearchResultData, SpeakRequestData,
};
