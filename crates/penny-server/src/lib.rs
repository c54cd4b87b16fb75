pub mod api_client;
pub mod config;
pub mod credentials;
pub mod event_bus;
pub mod interaction;
pub mod notices;
pub mod speech;
