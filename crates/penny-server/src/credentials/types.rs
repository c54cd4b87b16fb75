use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use super::settings_store::{SettingsMap, TOKENS_KEY};

/// Which of the two independently refreshed credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialSlot {
    /// Application access token, re-obtained with the client-credentials grant
    App,
    /// Chat user token, rotated with its refresh token
    User,
}

impl CredentialSlot {
    pub const ALL: [CredentialSlot; 2] = [CredentialSlot::App, CredentialSlot::User];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSlot::App => "app",
            CredentialSlot::User => "user",
        }
    }

    /// Settings key of the access token
    pub fn token_key(&self) -> &'static str {
        match self {
            CredentialSlot::App => "TWITCH_APP_ACCESS_TOKEN",
            CredentialSlot::User => "TWITCH_CHAT_TOKEN",
        }
    }

    /// Settings key of the expiry timestamp (unix seconds)
    pub fn expires_at_key(&self) -> &'static str {
        match self {
            CredentialSlot::App => "TWITCH_APP_TOKEN_EXPIRES_AT",
            CredentialSlot::User => "TWITCH_CHAT_TOKEN_EXPIRES_AT",
        }
    }

    /// Settings key of the refresh token, if the slot has one
    pub fn refresh_token_key(&self) -> Option<&'static str> {
        match self {
            CredentialSlot::App => None,
            CredentialSlot::User => Some("TWITCH_CHAT_REFRESH_TOKEN"),
        }
    }
}

impl fmt::Display for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OAuth credential
///
/// `expires_at` always describes `access_token`; both are replaced together.
#[derive(Clone, PartialEq, Default)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
            refresh_token,
        }
    }

    /// Whether the credential should be renewed at `now`
    ///
    /// Unknown expiry or an empty token counts as due.
    pub fn is_due(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        if self.access_token.is_empty() {
            return true;
        }
        match self.expires_at {
            Some(expires_at) => expires_at - now < threshold,
            None => true,
        }
    }

    /// Rebuild a slot from the persisted `tokens` object
    ///
    /// `fallback_token` / `fallback_refresh` come from static configuration
    /// and are used when the settings file has no value. A malformed expiry
    /// becomes `None`.
    pub fn from_settings(
        slot: CredentialSlot,
        settings: &SettingsMap,
        fallback_token: &str,
        fallback_refresh: Option<&str>,
    ) -> Self {
        let tokens = settings.get(TOKENS_KEY).and_then(Value::as_object);
        let lookup = |key: &str| tokens.and_then(|t| t.get(key));
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        let access_token = lookup(slot.token_key())
            .and_then(Value::as_str)
            .and_then(non_empty)
            .unwrap_or_else(|| fallback_token.to_string());

        let expires_at = lookup(slot.expires_at_key())
            .and_then(Value::as_i64)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        let refresh_token = slot.refresh_token_key().and_then(|key| {
            lookup(key)
                .and_then(Value::as_str)
                .and_then(non_empty)
                .or_else(|| fallback_refresh.and_then(non_empty))
        });

        Self {
            access_token,
            expires_at,
            refresh_token,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
