//! Client for the assistant API that writes Penny's phrases.
//!
//! Every operation answers `Ok(None)` when the API has nothing to say; the
//! router treats that as silence.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ApiConfig;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("server error {0}: {1}")]
    Server(u16, String),
}

/// Text-producing collaborator consumed by the command router
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Shout-out phrase for a channel
    async fn shout_out(&self, username: &str) -> Result<Option<String>, ApiError>;

    /// Conversational reply to a chatter who mentioned the bot
    async fn chat_reply(&self, username: &str, message: &str) -> Result<Option<String>, ApiError>;

    /// Reaction to a platform activity (follow, raid, ...)
    async fn event_reaction(
        &self,
        event_type: &str,
        username: Option<&str>,
        details: &Map<String, Value>,
    ) -> Result<Option<String>, ApiError>;
}

#[derive(Debug, Serialize)]
struct ShoutOutRequest<'a> {
    username: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    username: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct ReactionRequest<'a> {
    event_type: &'a str,
    username: Option<&'a str>,
    details: &'a Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PhraseResponse {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP implementation of [`ApiClient`]
#[derive(Clone)]
pub struct HttpApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_for_phrase<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Option<String>, ApiError> {
        let url = format!("{}/{}", self.base_url, path);

        let resp = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(path = %path, status = %status, "assistant API request failed");
            return Err(ApiError::Server(status.as_u16(), body));
        }

        let phrase = resp
            .json::<PhraseResponse>()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        Ok(phrase
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn shout_out(&self, username: &str) -> Result<Option<String>, ApiError> {
        self.post_for_phrase("shoutout", &ShoutOutRequest { username })
            .await
    }

    async fn chat_reply(&self, username: &str, message: &str) -> Result<Option<String>, ApiError> {
        self.post_for_phrase("respond_chat", &ChatRequest { username, message })
            .await
    }

    async fn event_reaction(
        &self,
        event_type: &str,
        username: Option<&str>,
        details: &Map<String, Value>,
    ) -> Result<Option<String>, ApiError> {
        self.post_for_phrase(
            "react_event",
            &ReactionRequest {
                event_type,
                username,
                details,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpApiClient {
        HttpApiClient::new(&ApiConfig {
            base_url: format!("{}/", server.uri()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_shout_out_returns_phrase() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/shoutout"))
            .and(body_json(serde_json::json!({"username": "ferris"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": "  Go follow ferris!  "})),
            )
            .mount(&server)
            .await;

        let phrase = client_for(&server).shout_out("ferris").await.unwrap();
        assert_eq!(phrase.as_deref(), Some("Go follow ferris!"));
    }

    #[tokio::test]
    async fn test_empty_text_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/respond_chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": ""})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/react_event"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.chat_reply("a", "hi penny").await.unwrap(), None);
        assert_eq!(
            client
                .event_reaction("channel.follow", None, &Map::new())
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_server_error_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client_for(&server).shout_out("x").await.unwrap_err();
        assert!(matches!(err, ApiError::Server(503, ref body) if body == "overloaded"));
    }
}
