use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::CredentialError;
use crate::http::{HttpClient, HttpRequest};

const LOGIN_PATH: &str = "user/login";
const TOKEN_PATH: &str = "user/token";

/// Email/password login payload
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub scope: String,
}

/// Refresh-token exchange payload
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    pub grant_type: String,
    pub refresh_token: String,
}

/// Tokens issued by the server on login or refresh
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    /// Servers may rotate the refresh token; None keeps the current one
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: Option<String>,
    #[serde(default, alias = "expiresIn")]
    pub expires_in: Option<u64>,
}

/// Source of fresh access tokens
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Log in with stored account details
    async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, CredentialError>;

    /// Exchange a refresh token for a new access token
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, CredentialError>;
}

/// Authenticator talking to the sync server's token endpoints
#[derive(Clone)]
pub struct HttpAuthenticator<C> {
    client: C,
    config: ClientConfig,
}

impl<C: HttpClient> HttpAuthenticator<C> {
    pub fn new(client: C, config: ClientConfig) -> Self {
        Self { client, config }
    }

    async fn exchange(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<TokenResponse, CredentialError> {
        let url = self
            .config
            .endpoint(path)
            .map_err(|e| CredentialError::Transport(e.to_string()))?;
        debug!(url = %url, "Requesting access token");

        let response = self
            .client
            .send(HttpRequest::post(url, body))
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        match response.status {
            status if (200..300).contains(&status) => serde_json::from_slice(&response.body)
                .map_err(|e| {
                    CredentialError::Transport(format!("Failed to parse token response: {e}"))
                }),
            status @ (400 | 401 | 403) => {
                let message = String::from_utf8_lossy(&response.body).into_owned();
                warn!(status, "Token request rejected");
                Err(CredentialError::Rejected(if message.is_empty() {
                    format!("HTTP {status}")
                } else {
                    message
                }))
            }
            status => Err(CredentialError::Transport(format!(
                "Token endpoint returned HTTP {status}"
            ))),
        }
    }
}

#[async_trait]
impl<C: HttpClient> Authenticator for HttpAuthenticator<C> {
    async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, CredentialError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            scope: "mobile".to_string(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        let tokens = self.exchange(LOGIN_PATH, body).await?;
        info!("Login successful");
        Ok(tokens)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, CredentialError> {
        let request = RefreshRequest {
            grant_type: "refresh_token".to_string(),
            refresh_token: refresh_token.to_string(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        let tokens = self.exchange(TOKEN_PATH, body).await?;
        debug!("Token refresh successful");
        Ok(tokens)
    }
}
