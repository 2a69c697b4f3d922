//! Google Drive API connector implementation
//!
//! Implements the `StorageProvider` trait for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::storage::{ContentStream, RemoteFile, StorageProvider};
use chrono::{DateTime, Utc};
use core_auth::TokenProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::types::{DriveFile, FilesListResponse, FOLDER_MIME_TYPE};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields to request for file resources
const FILE_FIELDS: &str = "id,name,size,modifiedTime,mimeType";

/// Timeout for metadata requests; media downloads are bounded by the caller
const LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Drive API connector
///
/// # Features
///
/// - Paginated listing of a single folder, newest first
/// - Streaming media downloads
/// - Exponential backoff for rate limiting and server errors
/// - Bearer tokens from a [`TokenProvider`], fetched per request
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::StorageProvider;
///
/// let connector = GoogleDriveConnector::new(http_client, token_provider);
/// let (files, next_page) = connector.list_folder("1AbCdEf", None).await?;
/// ```
pub struct GoogleDriveConnector {
    http_client: Arc<dyn HttpClient>,
    token_provider: Arc<dyn TokenProvider>,
    retry_policy: RetryPolicy,
    api_base: String,
}

impl GoogleDriveConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            http_client,
            token_provider,
            retry_policy: RetryPolicy::default(),
            api_base: DRIVE_API_BASE.to_string(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    async fn bearer_token(&self) -> std::result::Result<String, GoogleDriveError> {
        Ok(self.token_provider.access_token().await?)
    }

    /// Build the `files.list` URL for one page of a folder listing.
    fn list_url(&self, folder_id: &str, page_token: Option<&str>) -> String {
        // Drive query strings quote values with single quotes
        let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
        let query = format!("'{}' in parents and trashed=false", escaped);

        let mut url = format!(
            "{}/files?q={}&orderBy={}&pageSize={}&fields={}",
            self.api_base,
            urlencoding::encode(&query),
            urlencoding::encode("modifiedTime desc"),
            MAX_PAGE_SIZE,
            urlencoding::encode(&format!("nextPageToken,files({})", FILE_FIELDS)),
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }

        url
    }

    fn media_url(&self, file_id: &str) -> String {
        format!(
            "{}/files/{}?alt=media",
            self.api_base,
            urlencoding::encode(file_id)
        )
    }

    fn parse_timestamp(rfc3339: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn convert_file(drive_file: DriveFile) -> RemoteFile {
        let is_folder = drive_file.mime_type.as_deref() == Some(FOLDER_MIME_TYPE);

        RemoteFile {
            id: drive_file.id,
            name: drive_file.name,
            size: drive_file.size.and_then(|s| s.parse().ok()),
            modified_at: drive_file
                .modified_time
                .as_deref()
                .and_then(Self::parse_timestamp),
            mime_type: drive_file.mime_type,
            is_folder,
        }
    }

    /// Execute a GET request with retry logic
    ///
    /// Rate limiting, server errors and transport failures are retried with
    /// exponential backoff. Other non-2xx statuses fail immediately.
    #[instrument(skip(self), fields(url = %url))]
    async fn execute_with_retry(&self, url: String) -> Result<HttpResponse> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let token = self.bearer_token().await?;

            let request = HttpRequest::get(url.clone())
                .bearer_token(&token)
                .header("Accept", "application/json")
                .timeout(LIST_TIMEOUT);

            match self.http_client.execute(request).await {
                Ok(response) if response.is_success() => {
                    debug!(status = response.status, "API request succeeded");
                    return Ok(response);
                }
                Ok(response) if RetryPolicy::is_retryable_status(response.status) => {
                    if attempt >= self.retry_policy.max_attempts {
                        warn!(
                            "API request failed after {} attempts: status={}",
                            attempt, response.status
                        );
                        return Err(GoogleDriveError::ApiError {
                            status_code: response.status,
                            message: format!("Request failed after {} attempts", attempt),
                        }
                        .into());
                    }

                    let backoff = self.retry_policy.delay_for(attempt);
                    warn!(
                        "API request failed (attempt {}/{}): status={}, retrying in {}ms",
                        attempt,
                        self.retry_policy.max_attempts,
                        response.status,
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Ok(response) => {
                    warn!("API request failed: status={}", response.status);
                    return Err(GoogleDriveError::ApiError {
                        status_code: response.status,
                        message: String::from_utf8_lossy(&response.body).to_string(),
                    }
                    .into());
                }
                Err(e) => {
                    if attempt >= self.retry_policy.max_attempts {
                        warn!("API request failed after {} attempts: {}", attempt, e);
                        return Err(e);
                    }

                    let backoff = self.retry_policy.delay_for(attempt);
                    warn!(
                        "API request failed (attempt {}/{}): {}, retrying in {}ms",
                        attempt,
                        self.retry_policy.max_attempts,
                        e,
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait]
impl StorageProvider for GoogleDriveConnector {
    #[instrument(skip(self, page_token), fields(folder_id = %folder_id))]
    async fn list_folder(
        &self,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteFile>, Option<String>)> {
        let url = self.list_url(folder_id, page_token.as_deref());
        let response = self.execute_with_retry(url).await?;

        let list_response: FilesListResponse =
            serde_json::from_slice(&response.body).map_err(|e| {
                GoogleDriveError::ParseError(format!("Failed to parse files list response: {}", e))
            })?;

        let files: Vec<RemoteFile> = list_response
            .files
            .into_iter()
            .map(Self::convert_file)
            .collect();

        info!("Listed {} files from Google Drive", files.len());

        Ok((files, list_response.next_page_token))
    }

    #[instrument(skip(self), fields(file_id = %file_id))]
    async fn download_stream(&self, file_id: &str) -> Result<ContentStream> {
        let token = self.bearer_token().await?;
        let request = HttpRequest::get(self.media_url(file_id)).bearer_token(&token);

        debug!("Opening media stream");
        self.http_client.download_stream(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use bridge_traits::http::HttpMethod;
    use bytes::Bytes;
    use core_auth::AuthError;
    use mockall::mock;
    use std::collections::HashMap;
    use tokio::io::AsyncReadExt;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
            async fn download_stream(&self, request: HttpRequest) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
        }
    }

    mock! {
        Tokens {}

        #[async_trait]
        impl TokenProvider for Tokens {
            async fn access_token(&self) -> core_auth::Result<String>;
        }
    }

    fn tokens() -> Arc<MockTokens> {
        let mut tokens = MockTokens::new();
        tokens
            .expect_access_token()
            .returning(|| Ok("test_token".to_string()));
        Arc::new(tokens)
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            use_exponential_backoff: true,
        }
    }

    #[test]
    fn test_convert_file() {
        let drive_file = DriveFile {
            id: "file123".to_string(),
            name: "beach.mp4".to_string(),
            mime_type: Some("video/mp4".to_string()),
            size: Some("1024".to_string()),
            modified_time: Some("2024-01-02T00:00:00.000Z".to_string()),
        };

        let remote = GoogleDriveConnector::convert_file(drive_file);
        assert_eq!(remote.id, "file123");
        assert_eq!(remote.size, Some(1024));
        assert_eq!(
            remote.modified_at.map(|t| t.timestamp()),
            Some(1_704_153_600)
        );
        assert!(!remote.is_folder);
    }

    #[test]
    fn test_convert_folder_and_bad_fields() {
        let drive_file = DriveFile {
            id: "dir".to_string(),
            name: "nested".to_string(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            size: Some("not-a-number".to_string()),
            modified_time: Some("yesterday".to_string()),
        };

        let remote = GoogleDriveConnector::convert_file(drive_file);
        assert!(remote.is_folder);
        assert_eq!(remote.size, None);
        assert_eq!(remote.modified_at, None);
    }

    #[test]
    fn test_list_url_quotes_folder_and_paginates() {
        let connector = GoogleDriveConnector::new(Arc::new(MockHttpClient::new()), tokens());

        let url = connector.list_url("abc'def", Some("next page"));
        assert!(url.starts_with("https://www.googleapis.com/drive/v3/files?q="));
        assert!(url.contains(&*urlencoding::encode("'abc\\'def' in parents and trashed=false")));
        assert!(url.contains("orderBy=modifiedTime%20desc"));
        assert!(url.contains("pageSize=1000"));
        assert!(url.contains("pageToken=next%20page"));
    }

    #[tokio::test]
    async fn test_list_folder_success() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Get
                    && request.headers.get("Authorization").map(String::as_str)
                        == Some("Bearer test_token")
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"files":[{"id":"1","name":"a.mp4","mimeType":"video/mp4","size":"10","modifiedTime":"2024-05-01T10:00:00Z"}],"nextPageToken":"p2"}"#,
                ))
            });

        let connector = GoogleDriveConnector::new(Arc::new(http), tokens());
        let (files, next) = connector.list_folder("folder", None).await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "a.mp4");
        assert_eq!(next.as_deref(), Some("p2"));
    }

    #[tokio::test]
    async fn test_list_folder_retries_server_errors() {
        let mut http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(503, "busy")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(200, r#"{"files":[]}"#)));

        let connector =
            GoogleDriveConnector::new(Arc::new(http), tokens()).with_retry_policy(fast_retry());
        let (files, next) = connector.list_folder("folder", None).await.unwrap();

        assert!(files.is_empty());
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_list_folder_client_error_not_retried() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(404, "File not found: folder")));

        let connector =
            GoogleDriveConnector::new(Arc::new(http), tokens()).with_retry_policy(fast_retry());
        let err = connector.list_folder("folder", None).await.unwrap_err();

        assert!(matches!(err, BridgeError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_list_folder_gives_up_after_max_attempts() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(3)
            .returning(|_| Ok(json_response(500, "boom")));

        let connector =
            GoogleDriveConnector::new(Arc::new(http), tokens()).with_retry_policy(fast_retry());
        assert!(connector.list_folder("folder", None).await.is_err());
    }

    #[tokio::test]
    async fn test_list_folder_token_failure() {
        let mut token_provider = MockTokens::new();
        token_provider
            .expect_access_token()
            .returning(|| Err(AuthError::TokenRefreshFailed("invalid_grant".to_string())));

        let connector =
            GoogleDriveConnector::new(Arc::new(MockHttpClient::new()), Arc::new(token_provider));
        let err = connector.list_folder("folder", None).await.unwrap_err();

        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_download_stream_uses_media_url() {
        let mut http = MockHttpClient::new();
        http.expect_download_stream()
            .withf(|request| {
                request.url == "https://www.googleapis.com/drive/v3/files/abc?alt=media"
                    && request.headers.contains_key("Authorization")
            })
            .times(1)
            .returning(|_| {
                Ok(Box::new(std::io::Cursor::new(b"video-bytes".to_vec()))
                    as Box<dyn tokio::io::AsyncRead + Send + Unpin>)
            });

        let connector = GoogleDriveConnector::new(Arc::new(http), tokens());
        let mut stream = connector.download_stream("abc").await.unwrap();

        let mut body = Vec::new();
        stream.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"video-bytes");
    }
}
