use std::sync::Arc;

use anyhow::Context;
use penny::api_client::HttpApiClient;
use penny::config::Settings;
use penny::credentials::{
    Credential, CredentialSlot, CredentialStore, HttpIdentityClient, JsonSettingsStore,
    RefreshScheduler, SettingsMap, SettingsStore,
};
use penny::event_bus::{Event, EventBus};
use penny::interaction::CommandRouter;
use penny::notices::attach_log_sink;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting Penny");

    let settings = Settings::new().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let bus = Arc::new(EventBus::new());

    // Seed credentials from the persisted settings, falling back to static config
    let settings_store = Arc::new(JsonSettingsStore::new(&settings.settings_path));
    let persisted = settings_store.load().await.unwrap_or_else(|e| {
        warn!(path = %settings.settings_path, error = %e, "could not read settings file, starting without persisted tokens");
        SettingsMap::new()
    });

    let app = Credential::from_settings(
        CredentialSlot::App,
        &persisted,
        settings.twitch.app_access_token.as_deref().unwrap_or_default(),
        None,
    );
    let user = Credential::from_settings(
        CredentialSlot::User,
        &persisted,
        "",
        Some(settings.twitch.chat_refresh_token.as_str()),
    );
    let credentials = Arc::new(CredentialStore::new(app, user));

    let identity = Arc::new(
        HttpIdentityClient::new(settings.twitch.token_url.clone())
            .context("failed to build identity client")?,
    );
    let api = Arc::new(HttpApiClient::new(&settings.api).context("failed to build API client")?);

    attach_log_sink(&bus).await;

    let router = CommandRouter::new(
        bus.clone(),
        api,
        settings.command_prefix,
        &settings.bot_name,
    );
    router.start().await;

    let scheduler = Arc::new(RefreshScheduler::new(
        credentials,
        identity,
        settings_store,
        settings.twitch.client_identity(),
        settings.refresh_policy(),
    ));
    let scheduler_handle = scheduler.start(&bus).await;

    info!("Penny is listening; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Shutting down");
    bus.publish(Event::ShutdownSignal).await;

    if let Err(e) = scheduler_handle.await {
        error!(error = %e, "credential refresh scheduler panicked");
    }

    info!("Penny stopped");
    Ok(())
}
