//! Forwards `log.notice` events into the process log.

use penny_protocol::{Event, EventKind, NoticeLevel};

use crate::event_bus::{EventBus, SubscriptionId};

pub async fn attach_log_sink(bus: &EventBus) -> SubscriptionId {
    bus.subscribe(EventKind::LogNotice, |event| async move {
        if let Event::LogNotice(notice) = event {
            match notice.level {
                NoticeLevel::Debug => tracing::debug!(target: "penny::notice", "{}", notice.text),
                NoticeLevel::Info => tracing::info!(target: "penny::notice", "{}", notice.text),
                NoticeLevel::Warning => tracing::warn!(target: "penny::notice", "{}", notice.text),
                NoticeLevel::Error => tracing::error!(target: "penny::notice", "{}", notice.text),
            }
        }
        Ok(())
    })
    .await
}
