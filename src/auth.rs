// Identity bootstrap
//
// Bearer tokens for Azure Resource Manager come from one of two sources:
// - ClientSecret: OAuth2 client-credentials grant, cached until shortly before expiry
// - StaticToken: a token acquired elsewhere and handed in through the environment

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{AuthConfig, AuthMode};
use crate::error::{MediaFlowError, Result};

/// Source of bearer tokens for ARM requests
#[async_trait]
pub trait CredentialTrait: Send + Sync {
    /// Return a token valid for at least the next few minutes
    async fn token(&self) -> Result<String>;
}

/// Factory for creating credential instances
pub struct CredentialFactory;

impl CredentialFactory {
    pub fn create(config: &AuthConfig, client: Client) -> Result<Arc<dyn CredentialTrait>> {
        match config.mode {
            AuthMode::ClientSecret => {
                let secret = config.client_secret.clone().ok_or_else(|| {
                    MediaFlowError::Auth("client secret is not configured".to_string())
                })?;
                Ok(Arc::new(ClientSecretCredential::new(config, secret, client)))
            }
            AuthMode::StaticToken => {
                let token = config.access_token.clone().ok_or_else(|| {
                    MediaFlowError::Auth("access token is not configured".to_string())
                })?;
                Ok(Arc::new(StaticTokenCredential::new(token)))
            }
        }
    }
}

pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: String) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialTrait for StaticTokenCredential {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Client-credentials grant against Azure AD
pub struct ClientSecretCredential {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientSecretCredential {
    /// Tokens are refreshed this long before they expire
    const REFRESH_MARGIN_SECS: i64 = 300;

    pub fn new(config: &AuthConfig, client_secret: String, client: Client) -> Self {
        Self {
            client,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                config.authority.trim_end_matches('/'),
                config.tenant_id
            ),
            client_id: config.client_id.clone(),
            client_secret,
            scope: config.scope.clone(),
            cached: Mutex::new(None),
        }
    }

    async fn request_token(&self) -> Result<CachedToken> {
        debug!("Requesting access token from {}", self.token_url);

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => format!("{}: {}", err.error, err.error_description),
                Err(_) => body,
            };
            return Err(MediaFlowError::Auth(format!(
                "token request failed with {}: {}",
                status, detail
            )));
        }

        let token: TokenResponse = response.json().await?;
        info!("Acquired access token valid for {}s", token.expires_in);

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl CredentialTrait for ClientSecretCredential {
    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at - Utc::now() > Duration::seconds(Self::REFRESH_MARGIN_SECS) {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn auth_config(authority: &str) -> AuthConfig {
        AuthConfig {
            authority: authority.to_string(),
            tenant_id: "tenant".to_string(),
            client_id: "client".to_string(),
            client_secret: Some("secret".to_string()),
            ..AuthConfig::default()
        }
    }

    #[tokio::test]
    async fn test_client_secret_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = CredentialFactory::create(&auth_config(&server.uri()), Client::new()).unwrap();
        assert_eq!(credential.token().await.unwrap(), "tok-1");
        assert_eq!(credential.token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn test_token_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "bad secret"
            })))
            .mount(&server)
            .await;

        let credential = CredentialFactory::create(&auth_config(&server.uri()), Client::new()).unwrap();
        let err = credential.token().await.unwrap_err();
        assert!(matches!(err, MediaFlowError::Auth(ref msg) if msg.contains("invalid_client")));
    }

    #[tokio::test]
    async fn test_static_token() {
        let config = AuthConfig {
            mode: AuthMode::StaticToken,
            access_token: Some("static".to_string()),
            ..AuthConfig::default()
        };
        let credential = CredentialFactory::create(&config, Client::new()).unwrap();
        assert_eq!(credential.token().await.unwrap(), "static");
    }
}
