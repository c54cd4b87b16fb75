use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use penny_protocol::EventKind;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::RefreshError;
use super::identity::{ClientIdentity, IdentityService, TokenGrant};
use super::settings_store::{merge_tokens, SettingsMap, SettingsStore};
use super::store::CredentialStore;
use super::types::{Credential, CredentialSlot};
use crate::event_bus::EventBus;

/// How often to check and how close to expiry a refresh kicks in
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    pub interval: Duration,
    pub threshold: chrono::Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1800),
            threshold: chrono::Duration::hours(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotOutcome {
    /// Not due yet
    Skipped,
    Refreshed { expires_at: DateTime<Utc> },
    /// Refresh attempted and failed; the credential was left untouched
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub app: SlotOutcome,
    pub user: SlotOutcome,
}

/// Background task keeping both credential slots ahead of their expiry
pub struct RefreshScheduler {
    store: Arc<CredentialStore>,
    identity: Arc<dyn IdentityService>,
    settings: Arc<dyn SettingsStore>,
    client: ClientIdentity,
    policy: RefreshPolicy,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<CredentialStore>,
        identity: Arc<dyn IdentityService>,
        settings: Arc<dyn SettingsStore>,
        client: ClientIdentity,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            store,
            identity,
            settings,
            client,
            policy,
        }
    }

    /// Spawn the loop; it stops when a `system.shutdown` event is published
    pub async fn start(self: Arc<Self>, bus: &Arc<EventBus>) -> JoinHandle<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let subscription = bus
            .subscribe(EventKind::Shutdown, move |_| {
                shutdown_tx.send_replace(true);
                async { Ok(()) }
            })
            .await;

        let bus = Arc::clone(bus);
        tokio::spawn(async move {
            self.run(shutdown_rx).await;
            bus.unsubscribe(subscription).await;
        })
    }

    /// Check immediately, then once per interval until `shutdown` flips to true
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.policy.interval.as_secs(),
            threshold_secs = self.policy.threshold.num_seconds(),
            "credential refresh scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_once().await;
            debug!(?report, "refresh iteration finished");

            tokio::select! {
                _ = tokio::time::sleep(self.policy.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("credential refresh scheduler stopped");
    }

    /// One pass over both slots, sequentially
    pub async fn run_once(&self) -> IterationReport {
        let app = self.run_slot(CredentialSlot::App).await;
        let user = self.run_slot(CredentialSlot::User).await;
        IterationReport { app, user }
    }

    async fn run_slot(&self, slot: CredentialSlot) -> SlotOutcome {
        let current = self.store.snapshot(slot).await;
        if !current.is_due(Utc::now(), self.policy.threshold) {
            debug!(slot = %slot, expires_at = ?current.expires_at, "credential still valid");
            return SlotOutcome::Skipped;
        }

        match self.refresh(slot, &current).await {
            Ok(credential) => {
                let expires_at = credential.expires_at.unwrap_or_else(Utc::now);
                self.store.replace(slot, credential.clone()).await;
                info!(slot = %slot, expires_at = %expires_at, "credential refreshed");

                self.persist(slot, &credential).await;
                SlotOutcome::Refreshed { expires_at }
            }
            Err(e) => {
                warn!(slot = %slot, error = %e, "credential refresh failed, will retry next iteration");
                SlotOutcome::Failed(e.to_string())
            }
        }
    }

    async fn refresh(
        &self,
        slot: CredentialSlot,
        current: &Credential,
    ) -> Result<Credential, RefreshError> {
        if self.client.client_id.is_empty() {
            return Err(RefreshError::MissingConfig("twitch.client_id"));
        }
        if self.client.client_secret.is_empty() {
            return Err(RefreshError::MissingConfig("twitch.client_secret"));
        }

        match slot {
            CredentialSlot::App => {
                let grant = self.identity.client_credentials(&self.client).await?;
                credential_from_grant(grant, None)
            }
            CredentialSlot::User => {
                let refresh_token = current
                    .refresh_token
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .ok_or(RefreshError::MissingConfig("twitch.chat_refresh_token"))?;

                let grant = self
                    .identity
                    .refresh_token(&self.client, refresh_token)
                    .await?;
                credential_from_grant(grant, Some(refresh_token))
            }
        }
    }

    /// Merge the slot's keys into the last persisted settings and save
    async fn persist(&self, slot: CredentialSlot, credential: &Credential) {
        let mut settings = match self.settings.load().await {
            Ok(settings) => settings,
            Err(e) => {
                error!(slot = %slot, error = %e, "failed to load settings, refreshed credential not persisted");
                return;
            }
        };

        merge_tokens(&mut settings, token_updates(slot, credential));

        if let Err(e) = self.settings.save(&settings).await {
            error!(slot = %slot, error = %e, "failed to persist refreshed credential");
        }
    }
}

/// `expires_at` is stamped at receipt; the old refresh token is kept unless rotated
fn credential_from_grant(
    grant: TokenGrant,
    previous_refresh: Option<&str>,
) -> Result<Credential, RefreshError> {
    let expires_at = chrono::Duration::try_seconds(grant.expires_in)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| {
            RefreshError::Parse(format!("expires_in out of range: {}", grant.expires_in))
        })?;
    let refresh_token = previous_refresh.map(|previous| {
        grant
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| previous.to_string())
    });

    Ok(Credential::new(
        grant.access_token,
        Some(expires_at),
        refresh_token,
    ))
}

fn token_updates(slot: CredentialSlot, credential: &Credential) -> SettingsMap {
    let mut updates = SettingsMap::new();
    updates.insert(
        slot.token_key().to_string(),
        Value::String(credential.access_token.clone()),
    );
    if let Some(expires_at) = credential.expires_at {
        updates.insert(
            slot.expires_at_key().to_string(),
            json!(expires_at.timestamp()),
        );
    }
    if let (Some(key), Some(refresh)) = (slot.refresh_token_key(), &credential.refresh_token) {
        updates.insert(key.to_string(), Value::String(refresh.clone()));
    }
    updates
}
