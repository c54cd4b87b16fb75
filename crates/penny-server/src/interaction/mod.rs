pub mod command;

use std::sync::Arc;

use penny_protocol::{
    Event, EventKind, InboundMessageData, NoticeLevel, PlatformActivityData, SearchRequestData,
    SearchResultData,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::api_client::{ApiClient, ApiError};
use crate::event_bus::{EventBus, SubscriptionId};
use crate::speech::sanitize_for_speech;

pub use command::{Command, CommandAction, ParseFailure};

/// Source tag for searches started from chat; only results carrying it are
/// picked up again by the router.
pub const COMMAND_SOURCE: &str = "command";

/// Command Router
///
/// Turns chat lines and platform activity into intents on the bus. Holds no
/// state across messages apart from its configuration and lifecycle flag.
pub struct CommandRouter {
    bus: Arc<EventBus>,
    api: Arc<dyn ApiClient>,
    bot_name: String,
    prefix: char,
    active: RwLock<bool>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl CommandRouter {
    pub fn new(
        bus: Arc<EventBus>,
        api: Arc<dyn ApiClient>,
        prefix: char,
        bot_name: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            api,
            bot_name: bot_name.trim().to_lowercase(),
            prefix,
            active: RwLock::new(false),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    /// Subscribe to inbound messages, platform activity, search results and shutdown
    pub async fn start(self: &Arc<Self>) {
        if *self.active.read().await {
            warn!("command router already running");
            return;
        }
        *self.active.write().await = true;

        let kinds = [
            EventKind::InboundMessage,
            EventKind::PlatformActivity,
            EventKind::SearchResult,
            EventKind::Shutdown,
        ];

        let mut subscriptions = self.subscriptions.lock().await;
        for kind in kinds {
            let router = Arc::clone(self);
            let id = self
                .bus
                .subscribe(kind, move |event| {
                    let router = router.clone();
                    async move { router.handle_event(event).await }
                })
                .await;
            subscriptions.push(id);
        }

        info!(prefix = %self.prefix, bot_name = %self.bot_name, "command router started");
    }

    /// Stop servicing events and release subscriptions
    pub async fn stop(&self) {
        *self.active.write().await = false;

        let ids: Vec<SubscriptionId> = self.subscriptions.lock().await.drain(..).collect();
        for id in ids {
            self.bus.unsubscribe(id).await;
        }

        info!("command router stopped");
    }

    pub async fn is_active(&self) -> bool {
        *self.active.read().await
    }

    /// Handle a single event delivered by the bus
    pub async fn handle_event(&self, event: Event) -> anyhow::Result<()> {
        if !self.is_active().await {
            return Ok(());
        }

        match event {
            Event::InboundMessage(message) => self.handle_message(&message).await,
            Event::PlatformActivity(activity) => self.handle_platform_activity(&activity).await,
            Event::SearchResult(result) => self.handle_search_result(&result).await,
            Event::ShutdownSignal => self.stop().await,
            other => debug!(kind = %other.kind(), "command router ignoring event"),
        }

        Ok(())
    }

    // ========================================================================
    // Chat messages
    // ========================================================================

    async fn handle_message(&self, message: &InboundMessageData) {
        let text = message.text.trim();
        debug!(user = %message.username, text = %text, "chat message");

        if text.starts_with(self.prefix) {
            match command::parse_command(text, self.prefix, &message.username) {
                Ok(cmd) => self.dispatch(cmd).await,
                Err(e) => {
                    warn!(user = %message.username, error = %e, "could not parse command");
                    self.notice(
                        NoticeLevel::Warning,
                        format!("Could not parse command from {}: {}", message.username, e),
                    )
                    .await;
                }
            }
        } else if command::is_mention(text, &self.bot_name) {
            self.handle_mention(&message.username, text).await;
        }
    }

    async fn dispatch(&self, cmd: Command) {
        match cmd.action() {
            CommandAction::ShoutOut => self.handle_shoutout(&cmd).await,
            CommandAction::Search => self.handle_search(&cmd).await,
            CommandAction::Ask => self.handle_ask(&cmd).await,
            CommandAction::Unknown => {
                debug!(command = %cmd.name, user = %cmd.sender, "ignoring unknown command");
            }
        }
    }

    async fn handle_shoutout(&self, cmd: &Command) {
        let Some(target) = cmd.args.first() else {
            self.say(&format!(
                "To shout someone out, {}, please tell me their username, like {}shoutout awesome_streamer.",
                cmd.sender, self.prefix
            ))
            .await;
            return;
        };

        let target = target.trim_start_matches('@');
        self.notice(
            NoticeLevel::Info,
            format!("Shoutout command for {} from {}.", target, cmd.sender),
        )
        .await;

        let phrase = self.api.shout_out(target).await;
        self.say_phrase(phrase, "shoutout").await;
    }

    async fn handle_search(&self, cmd: &Command) {
        if cmd.args.is_empty() {
            self.say(&format!("What should I search for, {}?", cmd.sender))
                .await;
            return;
        }

        let query = cmd.joined_args();
        self.notice(
            NoticeLevel::Info,
            format!("Search command for '{}' from {}.", query, cmd.sender),
        )
        .await;

        self.bus
            .publish(Event::SearchRequest(SearchRequestData {
                query,
                source: COMMAND_SOURCE.to_string(),
                requester: cmd.sender.clone(),
            }))
            .await;
    }

    async fn handle_ask(&self, cmd: &Command) {
        if cmd.args.is_empty() {
            self.say(&format!("What would you like to ask, {}?", cmd.sender))
                .await;
            return;
        }

        self.bus
            .publish(Event::ai_query(
                format!("User {} asked:", cmd.sender),
                cmd.joined_args(),
            ))
            .await;
    }

    async fn handle_mention(&self, username: &str, text: &str) {
        self.notice(
            NoticeLevel::Info,
            format!("Mentioned by {}: {}", username, text),
        )
        .await;

        let phrase = self.api.chat_reply(username, text).await;
        self.say_phrase(phrase, "mention").await;
    }

    // ========================================================================
    // Platform activity
    // ========================================================================

    async fn handle_platform_activity(&self, activity: &PlatformActivityData) {
        let username = activity.username.as_deref();
        info!(
            event_type = %activity.event_type,
            user = username.unwrap_or("N/A"),
            "platform activity"
        );

        let reaction = self
            .api
            .event_reaction(&activity.event_type, username, &activity.details)
            .await;

        let spoken = match reaction {
            Ok(Some(phrase)) => self.say(&phrase).await,
            Ok(None) => false,
            Err(e) => {
                warn!(event_type = %activity.event_type, error = %e, "event reaction request failed");
                self.notice(
                    NoticeLevel::Warning,
                    format!("Reaction request for {} failed: {}", activity.event_type, e),
                )
                .await;
                return;
            }
        };

        if !spoken {
            self.notice(
                NoticeLevel::Warning,
                format!(
                    "No reaction phrase for {} by {}",
                    activity.event_type,
                    username.unwrap_or("N/A")
                ),
            )
            .await;
        }
    }

    // ========================================================================
    // Search results
    // ========================================================================

    async fn handle_search_result(&self, result: &SearchResultData) {
        if result.source != COMMAND_SOURCE {
            return;
        }

        let user = result.requester.as_deref().unwrap_or("someone");

        let top = match (&result.error, result.results.first()) {
            (None, Some(top)) => top,
            _ => {
                if let Some(e) = &result.error {
                    warn!(query = %result.query, error = %e, "search failed");
                }
                self.say(&format!(
                    "Sorry {}, I couldn't find anything about {}.",
                    user, result.query
                ))
                .await;
                return;
            }
        };

        let title = top.title.as_deref().unwrap_or("Unknown Title");
        let snippet = top.snippet.as_deref().unwrap_or("No description available.");

        self.bus
            .publish(Event::ai_query(
                format!(
                    "User '{}' asked to search for '{}'. The top result is '{}'. Briefly summarize this snippet for them in your voice:",
                    user, result.query, title
                ),
                snippet,
            ))
            .await;
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Publish a SpeakRequest; returns false when nothing speakable remained
    async fn say(&self, text: &str) -> bool {
        let text = sanitize_for_speech(text);
        if text.is_empty() {
            return false;
        }
        self.bus.publish(Event::speak(text)).await;
        true
    }

    /// Speak an API-produced phrase, degrading to silence on absence or error
    async fn say_phrase(&self, phrase: Result<Option<String>, ApiError>, context: &str) {
        match phrase {
            Ok(Some(text)) => {
                self.say(&text).await;
            }
            Ok(None) => debug!(context = %context, "no phrase available"),
            Err(e) => {
                warn!(context = %context, error = %e, "assistant API request failed");
                self.notice(
                    NoticeLevel::Warning,
                    format!("Could not get a {} phrase: {}", context, e),
                )
                .await;
            }
        }
    }

    async fn notice(&self, level: NoticeLevel, text: String) {
        self.bus.publish(Event::notice(level, text)).await;
    }
}
