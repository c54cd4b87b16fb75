use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::credentials::{ClientIdentity, RefreshPolicy};

/// Twitch application and chat-account credentials
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TwitchConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Initial app token, used until the settings file holds a newer one
    #[serde(default)]
    pub app_access_token: Option<String>,
    /// Initial chat refresh token, used until the settings file holds a newer one
    #[serde(default)]
    pub chat_refresh_token: String,
    /// OAuth token endpoint (default: Twitch's)
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            app_access_token: None,
            chat_refresh_token: String::new(),
            token_url: default_token_url(),
        }
    }
}

impl TwitchConfig {
    pub fn client_identity(&self) -> ClientIdentity {
        ClientIdentity {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }
}

/// Assistant API that produces phrases
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_token_url() -> String {
    "https://id.twitch.tv/oauth2/token".to_string()
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_command_prefix() -> char {
    '!'
}

fn default_bot_name() -> String {
    "penny".to_string()
}

fn default_refresh_interval() -> u64 {
    1800
}

fn default_refresh_threshold() -> i64 {
    3 * 60 * 60
}

fn default_settings_path() -> String {
    "settings.json".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: char,
    /// Name chatters use to address the bot; empty disables mentions
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold_seconds: i64,
    #[serde(default)]
    pub twitch: TwitchConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// JSON file holding persisted tokens
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            bot_name: default_bot_name(),
            refresh_interval_seconds: default_refresh_interval(),
            refresh_threshold_seconds: default_refresh_threshold(),
            twitch: TwitchConfig::default(),
            api: ApiConfig::default(),
            settings_path: default_settings_path(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // .env is optional
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with defaults
            .add_source(File::with_name("config/default").required(false))
            // Add environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (not tracked by git)
            .add_source(File::with_name("config/local").required(false))
            // PENNY_BOT_NAME, PENNY_TWITCH__CLIENT_ID, ...
            .add_source(
                Environment::with_prefix("PENNY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Self::from_config(s)
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        RefreshPolicy {
            interval: Duration::from_secs(self.refresh_interval_seconds),
            threshold: chrono::Duration::seconds(self.refresh_threshold_seconds),
        }
    }
}
