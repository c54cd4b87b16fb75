use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::StoreError;

/// Top-level settings mapping
pub type SettingsMap = Map<String, Value>;

/// Key of the object holding credential values inside the settings mapping
pub const TOKENS_KEY: &str = "tokens";

/// Durable settings store
///
/// Writers must load, merge their own keys and save, so unrelated keys survive.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Result<SettingsMap, StoreError>;

    async fn save(&self, settings: &SettingsMap) -> Result<(), StoreError>;
}

/// Merge `updates` into the `tokens` object of `settings`, creating it if needed
pub fn merge_tokens(settings: &mut SettingsMap, updates: SettingsMap) {
    let tokens = settings
        .entry(TOKENS_KEY)
        .or_insert_with(|| Value::Object(Map::new()));

    if !tokens.is_object() {
        *tokens = Value::Object(Map::new());
    }

    if let Value::Object(tokens) = tokens {
        tokens.extend(updates);
    }
}

/// Settings stored as a pretty-printed JSON file
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn load(&self) -> Result<SettingsMap, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SettingsMap::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(SettingsMap::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject),
        }
    }

    async fn save(&self, settings: &SettingsMap) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, content).await?;

        tracing::debug!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}
