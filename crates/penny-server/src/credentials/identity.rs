use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::RefreshError;

/// Application identity registered with the identity service
#[derive(Clone)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Successful token response
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds from the moment of issue
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// OAuth token endpoint
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Obtain a fresh application token
    async fn client_credentials(&self, client: &ClientIdentity) -> Result<TokenGrant, RefreshError>;

    /// Rotate a user token
    async fn refresh_token(
        &self,
        client: &ClientIdentity,
        refresh_token: &str,
    ) -> Result<TokenGrant, RefreshError>;
}

/// Form-encoded OAuth client against a token URL
pub struct HttpIdentityClient {
    http: reqwest::Client,
    token_url: String,
}

impl HttpIdentityClient {
    pub fn new(token_url: impl Into<String>) -> Result<Self, RefreshError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        Ok(Self {
            http,
            token_url: token_url.into(),
        })
    }

    async fn request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, RefreshError> {
        let resp = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| RefreshError::Network(e.to_string()))?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<TokenGrant>()
            .await
            .map_err(|e| RefreshError::Parse(e.to_string()))
    }
}

#[async_trait]
impl IdentityService for HttpIdentityClient {
    async fn client_credentials(&self, client: &ClientIdentity) -> Result<TokenGrant, RefreshError> {
        self.request(&[
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("grant_type", "client_credentials"),
        ])
        .await
    }

    async fn refresh_token(
        &self,
        client: &ClientIdentity,
        refresh_token: &str,
    ) -> Result<TokenGrant, RefreshError> {
        self.request(&[
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}
