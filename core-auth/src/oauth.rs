//! OAuth 2.0 refresh-token grant (RFC 6749 §6)
//!
//! Exchanges a long-lived refresh token issued to an installed-app client for
//! short-lived access tokens. The token endpoint is called with a
//! form-encoded POST; 4xx responses fail immediately and 5xx responses are
//! retried with exponential backoff.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, RefreshTokenFlow};
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthConfig::google("client-id", "client-secret");
//! let flow = RefreshTokenFlow::new(config, "1//0g-refresh", http_client);
//! let tokens = flow.refresh_access_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::provider::TokenSource;
use crate::types::{OAuthTokens, TokenResponse, GOOGLE_TOKEN_URL};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use core_runtime::logging::redact_if_sensitive;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};

const MAX_TOKEN_ATTEMPTS: u32 = 3;

/// Client registration used for the refresh grant.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub token_url: String,
}

impl OAuthConfig {
    /// Configuration for Google's token endpoint.
    pub fn google(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("token_url", &self.token_url)
            .finish()
    }
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
}

/// Obtains access tokens from a stored refresh token.
pub struct RefreshTokenFlow {
    config: OAuthConfig,
    refresh_token: String,
    http_client: Arc<dyn HttpClient>,
}

impl RefreshTokenFlow {
    pub fn new(
        config: OAuthConfig,
        refresh_token: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            config,
            refresh_token: refresh_token.into(),
            http_client,
        }
    }

    /// Request a fresh access token.
    ///
    /// The returned token set keeps the original refresh token when the
    /// endpoint does not rotate it.
    #[instrument(skip(self), fields(client_id = %self.config.client_id))]
    pub async fn refresh_access_token(&self) -> Result<OAuthTokens> {
        tracing::debug!("Refreshing access token");

        let grant = RefreshGrant {
            grant_type: "refresh_token",
            refresh_token: &self.refresh_token,
            client_id: &self.config.client_id,
            client_secret: self.config.client_secret.as_deref(),
        };

        let token_response =
            request_token(self.http_client.as_ref(), &self.config.token_url, &grant).await?;

        tracing::info!(
            access_token = %redact_if_sensitive("access_token", &token_response.access_token),
            "Successfully refreshed token (expires in {}s)",
            token_response.expires_in
        );

        Ok(OAuthTokens::new(
            token_response.access_token,
            token_response
                .refresh_token
                .or_else(|| Some(self.refresh_token.clone())),
            token_response.expires_in,
        ))
    }
}

#[async_trait]
impl TokenSource for RefreshTokenFlow {
    async fn fetch_token(&self) -> Result<OAuthTokens> {
        self.refresh_access_token().await
    }

    fn kind(&self) -> &'static str {
        "oauth-refresh-token"
    }
}

/// POST a form-encoded grant to a token endpoint.
///
/// Client errors fail immediately. Server errors and rate limiting are
/// retried up to [`MAX_TOKEN_ATTEMPTS`] times with exponential backoff.
pub(crate) async fn request_token<T: Serialize + ?Sized + Sync>(
    http_client: &dyn HttpClient,
    token_url: &str,
    grant: &T,
) -> Result<TokenResponse> {
    let mut attempts = 0;

    loop {
        attempts += 1;

        let request = HttpRequest::new(HttpMethod::Post, token_url)
            .form(grant)
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

        let response = http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if response.is_success() {
            return response
                .json()
                .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)));
        }

        let status = response.status;
        let error_body = response
            .text()
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        if (400..500).contains(&status) && status != 429 {
            warn!(
                status = status,
                error = %error_body,
                "Token request rejected without retry"
            );
            return Err(AuthError::TokenRefreshFailed(format!(
                "Token endpoint returned {}: {}",
                status, error_body
            )));
        }

        if attempts >= MAX_TOKEN_ATTEMPTS {
            return Err(AuthError::TokenRefreshFailed(format!(
                "Token request failed after {} attempts. Last error: {} - {}",
                attempts, status, error_body
            )));
        }

        let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
        warn!(
            status = status,
            attempts = attempts,
            delay_ms = delay.as_millis() as u64,
            "Token request failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
