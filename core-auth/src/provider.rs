//! Access token providers
//!
//! [`TokenSource`] performs one grant against a token endpoint.
//! [`CachingTokenProvider`] wraps a source and hands out the cached access
//! token until it is about to expire. Concurrent callers share a single
//! refresh.

use crate::error::{AuthError, Result};
use crate::oauth::{OAuthConfig, RefreshTokenFlow};
use crate::service_account::{ServiceAccountFlow, ServiceAccountKey};
use crate::types::{OAuthTokens, DRIVE_READONLY_SCOPE};
use async_trait::async_trait;
use bridge_traits::http::HttpClient;
use core_runtime::config::CredentialConfig;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One way of obtaining a fresh token set.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> Result<OAuthTokens>;

    /// Short label for logs.
    fn kind(&self) -> &'static str;
}

/// Supplies a valid bearer token for API requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Caches tokens from a [`TokenSource`] until they near expiry.
pub struct CachingTokenProvider {
    source: Arc<dyn TokenSource>,
    cached: Mutex<Option<OAuthTokens>>,
}

impl CachingTokenProvider {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}

#[async_trait]
impl TokenProvider for CachingTokenProvider {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(tokens) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(tokens.access_token.clone());
        }

        debug!(source = self.source.kind(), "Fetching access token");
        let tokens = self.source.fetch_token().await?;
        let access_token = tokens.access_token.clone();
        *cached = Some(tokens);

        Ok(access_token)
    }
}

/// Build a token provider for the configured credentials.
///
/// Returns `Ok(None)` when no credentials are configured.
pub async fn token_provider_for(
    credentials: &CredentialConfig,
    http_client: Arc<dyn HttpClient>,
) -> Result<Option<Arc<dyn TokenProvider>>> {
    let scopes = vec![DRIVE_READONLY_SCOPE.to_string()];

    let source: Arc<dyn TokenSource> = match credentials {
        CredentialConfig::ServiceAccountFile(path) => {
            let key = ServiceAccountKey::from_file(path).await?;
            Arc::new(ServiceAccountFlow::new(key, scopes, http_client))
        }
        CredentialConfig::ServiceAccountJson(json) => {
            let key = ServiceAccountKey::from_json(json)?;
            Arc::new(ServiceAccountFlow::new(key, scopes, http_client))
        }
        CredentialConfig::OAuthRefresh {
            client_id,
            client_secret,
            refresh_token,
        } => {
            if refresh_token.is_empty() {
                return Err(AuthError::InvalidCredentials(
                    "Refresh token is empty".to_string(),
                ));
            }
            Arc::new(RefreshTokenFlow::new(
                OAuthConfig::google(client_id.clone(), client_secret.clone()),
                refresh_token.clone(),
                http_client,
            ))
        }
        CredentialConfig::None => return Ok(None),
    };

    info!(credentials = credentials.kind(), "Using Google credentials");
    Ok(Some(Arc::new(CachingTokenProvider::new(source))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{HttpRequest, HttpResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        expires_in: i64,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn fetch_token(&self) -> Result<OAuthTokens> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(OAuthTokens::new(format!("token-{}", n), None, self.expires_in))
        }

        fn kind(&self) -> &'static str {
            "counting"
        }
    }

    struct FailingSource;

    #[async_trait]
    impl TokenSource for FailingSource {
        async fn fetch_token(&self) -> Result<OAuthTokens> {
            Err(AuthError::TokenRefreshFailed("invalid_grant".to_string()))
        }

        fn kind(&self) -> &'static str {
            "failing"
        }
    }

    struct NoHttp;

    #[async_trait]
    impl HttpClient for NoHttp {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(BridgeError::NotAvailable("offline".to_string()))
        }

        async fn download_stream(
            &self,
            _request: HttpRequest,
        ) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
            Err(BridgeError::NotAvailable("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            expires_in: 3600,
        });
        let provider = CachingTokenProvider::new(source.clone());

        assert_eq!(provider.access_token().await.unwrap(), "token-1");
        assert_eq!(provider.access_token().await.unwrap(), "token-1");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        provider.invalidate().await;
        assert_eq!(provider.access_token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            expires_in: 10,
        });
        let provider = CachingTokenProvider::new(source.clone());

        provider.access_token().await.unwrap();
        provider.access_token().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_source_error_propagates() {
        let provider = CachingTokenProvider::new(Arc::new(FailingSource));
        assert!(matches!(
            provider.access_token().await,
            Err(AuthError::TokenRefreshFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_no_credentials_yields_no_provider() {
        let provider = token_provider_for(&CredentialConfig::None, Arc::new(NoHttp))
            .await
            .unwrap();
        assert!(provider.is_none());
    }

    #[tokio::test]
    async fn test_malformed_inline_key_is_rejected() {
        let result = token_provider_for(
            &CredentialConfig::ServiceAccountJson("{\"client_email\":1}".to_string()),
            Arc::new(NoHttp),
        )
        .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_refresh_credentials_build_provider() {
        let credentials = CredentialConfig::OAuthRefresh {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
        };
        let provider = token_provider_for(&credentials, Arc::new(NoHttp))
            .await
            .unwrap()
            .unwrap();

        // The HTTP layer is offline, so the first fetch surfaces a network error
        assert!(matches!(
            provider.access_token().await,
            Err(AuthError::NetworkError(_))
        ));
    }
}
