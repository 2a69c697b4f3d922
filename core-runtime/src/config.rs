//! # Gallery Configuration
//!
//! Configuration for the video gallery sync engine.
//!
//! ## Overview
//!
//! The configuration uses a builder pattern to construct a [`GalleryConfig`]
//! and enforces fail-fast validation, so a bad value is reported before any
//! file is touched. Binaries normally call [`GalleryConfig::from_env`] after
//! loading a `.env` file.
//!
//! ## Environment
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `GALLERY_ROOT` | Directory holding `videos/`, `previews/`, `thumbs/`, `videos.json` | `.` |
//! | `GOOGLE_DRIVE_FOLDER_ID` | Remote folder to mirror | unset (demo mode) |
//! | `GOOGLE_SERVICE_ACCOUNT_KEY_FILE` | Service account key file, relative to the root | |
//! | `GOOGLE_SERVICE_ACCOUNT_KEY` | Service account key as inline JSON | |
//! | `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET` / `GOOGLE_REFRESH_TOKEN` | OAuth refresh credentials | |
//! | `GALLERY_PREVIEW_MODE` | `thumbnail` or `clip` | `thumbnail` |
//! | `GALLERY_MAX_CONCURRENCY` | Items processed in parallel | `1` |
//! | `GALLERY_DOWNLOAD_TIMEOUT_SECS` | Per-file download bound | `600` |
//! | `GALLERY_TRANSCODE_TIMEOUT_SECS` | Per-file transcode bound | `120` |
//! | `FFMPEG_PATH` | ffmpeg executable | `ffmpeg` |
//!
//! Credential variables are checked in the order listed; the first complete
//! set wins.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{GalleryConfig, PreviewFlavor};
//!
//! let config = GalleryConfig::builder()
//!     .root_dir("/srv/gallery")
//!     .folder_id("1AbCdEf")
//!     .preview_flavor(PreviewFlavor::Clip)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Interval between runs of the continuous runner.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(10);

/// Delay before the continuous runner retries after a failed run.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

const MAX_CONCURRENCY_LIMIT: usize = 32;

/// How the engine authenticates against Google Drive.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialConfig {
    /// Path to a service account JSON key file
    ServiceAccountFile(PathBuf),
    /// Service account JSON key supplied inline
    ServiceAccountJson(String),
    /// Installed-app OAuth client plus a long-lived refresh token
    OAuthRefresh {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    /// No credentials; the engine runs in demo mode
    None,
}

impl CredentialConfig {
    pub fn is_configured(&self) -> bool {
        !matches!(self, CredentialConfig::None)
    }

    /// Short label for logs, never containing secret material.
    pub fn kind(&self) -> &'static str {
        match self {
            CredentialConfig::ServiceAccountFile(_) => "service-account-file",
            CredentialConfig::ServiceAccountJson(_) => "service-account-json",
            CredentialConfig::OAuthRefresh { .. } => "oauth-refresh-token",
            CredentialConfig::None => "none",
        }
    }
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialConfig::ServiceAccountFile(path) => {
                f.debug_tuple("ServiceAccountFile").field(path).finish()
            }
            CredentialConfig::ServiceAccountJson(_) => {
                f.debug_tuple("ServiceAccountJson").field(&"[REDACTED]").finish()
            }
            CredentialConfig::OAuthRefresh { client_id, .. } => f
                .debug_struct("OAuthRefresh")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .field("refresh_token", &"[REDACTED]")
                .finish(),
            CredentialConfig::None => f.write_str("None"),
        }
    }
}

/// Which derived asset the preview generator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewFlavor {
    /// Half-second mp4 clip stored under `previews/`
    Clip,
    /// Half-second looping animated WebP stored under `thumbs/`
    #[default]
    Thumbnail,
}

impl PreviewFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviewFlavor::Clip => "clip",
            PreviewFlavor::Thumbnail => "thumbnail",
        }
    }
}

impl FromStr for PreviewFlavor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clip" | "preview" => Ok(PreviewFlavor::Clip),
            "thumbnail" | "thumb" | "webp" => Ok(PreviewFlavor::Thumbnail),
            _ => Err(Error::invalid_value(
                "GALLERY_PREVIEW_MODE",
                s,
                "expected clip or thumbnail",
            )),
        }
    }
}

/// Runtime configuration of the sync engine.
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// Directory that holds every published file
    pub root_dir: PathBuf,
    /// Remote folder to mirror; `None` means demo mode
    pub folder_id: Option<String>,
    pub credentials: CredentialConfig,
    pub preview_flavor: PreviewFlavor,
    /// Items fetched and transcoded in parallel
    pub max_concurrency: usize,
    pub download_timeout: Duration,
    pub transcode_timeout: Duration,
    pub ffmpeg_path: PathBuf,
    /// Delay between continuous runs
    pub sync_interval: Duration,
    /// Delay after a failed continuous run
    pub retry_backoff: Duration,
}

impl GalleryConfig {
    /// Creates a new builder for constructing a `GalleryConfig`.
    pub fn builder() -> GalleryConfigBuilder {
        GalleryConfigBuilder::default()
    }

    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut builder = GalleryConfig::builder();

        let root_dir = PathBuf::from(get("GALLERY_ROOT").unwrap_or_else(|| ".".to_string()));
        builder = builder.root_dir(root_dir.clone());

        if let Some(folder_id) = get("GOOGLE_DRIVE_FOLDER_ID") {
            builder = builder.folder_id(folder_id);
        }

        let credentials = if let Some(key_file) = get("GOOGLE_SERVICE_ACCOUNT_KEY_FILE") {
            let path = PathBuf::from(key_file);
            let path = if path.is_relative() {
                root_dir.join(path)
            } else {
                path
            };
            CredentialConfig::ServiceAccountFile(path)
        } else if let Some(json) = get("GOOGLE_SERVICE_ACCOUNT_KEY") {
            CredentialConfig::ServiceAccountJson(json)
        } else if let (Some(client_id), Some(client_secret), Some(refresh_token)) = (
            get("GOOGLE_CLIENT_ID"),
            get("GOOGLE_CLIENT_SECRET"),
            get("GOOGLE_REFRESH_TOKEN"),
        ) {
            CredentialConfig::OAuthRefresh {
                client_id,
                client_secret,
                refresh_token,
            }
        } else {
            CredentialConfig::None
        };
        builder = builder.credentials(credentials);

        if let Some(mode) = get("GALLERY_PREVIEW_MODE") {
            builder = builder.preview_flavor(mode.parse()?);
        }
        if let Some(value) = get("GALLERY_MAX_CONCURRENCY") {
            builder = builder.max_concurrency(parse_number("GALLERY_MAX_CONCURRENCY", &value)?);
        }
        if let Some(value) = get("GALLERY_DOWNLOAD_TIMEOUT_SECS") {
            builder = builder.download_timeout(Duration::from_secs(parse_number(
                "GALLERY_DOWNLOAD_TIMEOUT_SECS",
                &value,
            )?));
        }
        if let Some(value) = get("GALLERY_TRANSCODE_TIMEOUT_SECS") {
            builder = builder.transcode_timeout(Duration::from_secs(parse_number(
                "GALLERY_TRANSCODE_TIMEOUT_SECS",
                &value,
            )?));
        }
        if let Some(path) = get("FFMPEG_PATH") {
            builder = builder.ffmpeg_path(path);
        }

        builder.build()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(Error::Config("Root directory cannot be empty".to_string()));
        }

        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(Error::invalid_value(
                "max_concurrency",
                self.max_concurrency.to_string(),
                format!("must be between 1 and {}", MAX_CONCURRENCY_LIMIT),
            ));
        }

        for (name, value) in [
            ("download_timeout", self.download_timeout),
            ("transcode_timeout", self.transcode_timeout),
            ("sync_interval", self.sync_interval),
        ] {
            if value.is_zero() {
                return Err(Error::invalid_value(name, "0", "must be greater than zero"));
            }
        }

        if self.ffmpeg_path.as_os_str().is_empty() {
            return Err(Error::Config("ffmpeg path cannot be empty".to_string()));
        }

        if let CredentialConfig::ServiceAccountJson(json) = &self.credentials {
            if !json.trim_start().starts_with('{') {
                return Err(Error::invalid_value(
                    "GOOGLE_SERVICE_ACCOUNT_KEY",
                    "[REDACTED]",
                    "expected a JSON object",
                ));
            }
        }

        Ok(())
    }

    /// Whether a remote sync can be attempted at all.
    pub fn remote_configured(&self) -> bool {
        self.folder_id.is_some() && self.credentials.is_configured()
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.root_dir.join("videos")
    }

    /// Directory for the active preview flavor.
    pub fn derived_dir(&self) -> PathBuf {
        match self.preview_flavor {
            PreviewFlavor::Clip => self.root_dir.join("previews"),
            PreviewFlavor::Thumbnail => self.root_dir.join("thumbs"),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root_dir.join("videos.json")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.root_dir.join(".thumb-cache.json")
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::invalid_value(key, value, "expected a non-negative integer"))
}

/// Builder for [`GalleryConfig`].
#[derive(Debug, Default)]
pub struct GalleryConfigBuilder {
    root_dir: Option<PathBuf>,
    folder_id: Option<String>,
    credentials: Option<CredentialConfig>,
    preview_flavor: Option<PreviewFlavor>,
    max_concurrency: Option<usize>,
    download_timeout: Option<Duration>,
    transcode_timeout: Option<Duration>,
    ffmpeg_path: Option<PathBuf>,
    sync_interval: Option<Duration>,
    retry_backoff: Option<Duration>,
}

impl GalleryConfigBuilder {
    /// Sets the directory that holds every published file (required).
    pub fn root_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    pub fn folder_id(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn credentials(mut self, credentials: CredentialConfig) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn preview_flavor(mut self, flavor: PreviewFlavor) -> Self {
        self.preview_flavor = Some(flavor);
        self
    }

    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    pub fn transcode_timeout(mut self, timeout: Duration) -> Self {
        self.transcode_timeout = Some(timeout);
        self
    }

    pub fn ffmpeg_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.ffmpeg_path = Some(path.into());
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = Some(backoff);
        self
    }

    /// Builds the final `GalleryConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the root directory is missing and
    /// `Error::InvalidValue` for out-of-range numeric settings.
    pub fn build(self) -> Result<GalleryConfig> {
        let root_dir = self.root_dir.ok_or_else(|| {
            Error::Config("Root directory is required. Use .root_dir() to set it.".to_string())
        })?;

        let config = GalleryConfig {
            root_dir,
            folder_id: self.folder_id.filter(|id| !id.trim().is_empty()),
            credentials: self.credentials.unwrap_or(CredentialConfig::None),
            preview_flavor: self.preview_flavor.unwrap_or_default(),
            max_concurrency: self.max_concurrency.unwrap_or(1),
            download_timeout: self.download_timeout.unwrap_or(Duration::from_secs(600)),
            transcode_timeout: self.transcode_timeout.unwrap_or(Duration::from_secs(120)),
            ffmpeg_path: self.ffmpeg_path.unwrap_or_else(|| PathBuf::from("ffmpeg")),
            sync_interval: self.sync_interval.unwrap_or(DEFAULT_SYNC_INTERVAL),
            retry_backoff: self.retry_backoff.unwrap_or(DEFAULT_RETRY_BACKOFF),
        };

        config.validate()?;

        Ok(config)
    }
}

impl AsRef<Path> for GalleryConfig {
    fn as_ref(&self) -> &Path {
        &self.root_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_builder_requires_root_dir() {
        let result = GalleryConfig::builder().build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let config = GalleryConfig::builder().root_dir("/srv/gallery").build().unwrap();

        assert_eq!(config.folder_id, None);
        assert_eq!(config.credentials, CredentialConfig::None);
        assert_eq!(config.preview_flavor, PreviewFlavor::Thumbnail);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.sync_interval, Duration::from_secs(10));
        assert_eq!(config.retry_backoff, Duration::from_secs(5));
        assert!(!config.remote_configured());
    }

    #[test]
    fn test_paths_follow_flavor() {
        let thumbs = GalleryConfig::builder().root_dir("/g").build().unwrap();
        assert_eq!(thumbs.derived_dir(), PathBuf::from("/g/thumbs"));
        assert_eq!(thumbs.videos_dir(), PathBuf::from("/g/videos"));
        assert_eq!(thumbs.manifest_path(), PathBuf::from("/g/videos.json"));
        assert_eq!(thumbs.cache_path(), PathBuf::from("/g/.thumb-cache.json"));

        let clips = GalleryConfig::builder()
            .root_dir("/g")
            .preview_flavor(PreviewFlavor::Clip)
            .build()
            .unwrap();
        assert_eq!(clips.derived_dir(), PathBuf::from("/g/previews"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let result = GalleryConfig::builder()
            .root_dir("/g")
            .max_concurrency(0)
            .build();
        assert!(matches!(result, Err(Error::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let result = GalleryConfig::builder()
            .root_dir("/g")
            .transcode_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_folder_id_means_demo() {
        let config = GalleryConfig::builder()
            .root_dir("/g")
            .folder_id("  ")
            .build()
            .unwrap();
        assert_eq!(config.folder_id, None);
    }

    #[test]
    fn test_from_lookup_service_account_file_is_relative_to_root() {
        let config = GalleryConfig::from_lookup(lookup(&[
            ("GALLERY_ROOT", "/srv/gallery"),
            ("GOOGLE_DRIVE_FOLDER_ID", "folder-1"),
            ("GOOGLE_SERVICE_ACCOUNT_KEY_FILE", "keys/sa.json"),
            ("GOOGLE_SERVICE_ACCOUNT_KEY", "{\"ignored\":true}"),
        ]))
        .unwrap();

        assert_eq!(
            config.credentials,
            CredentialConfig::ServiceAccountFile(PathBuf::from("/srv/gallery/keys/sa.json"))
        );
        assert_eq!(config.folder_id.as_deref(), Some("folder-1"));
        assert!(config.remote_configured());
    }

    #[test]
    fn test_from_lookup_oauth_requires_all_three() {
        let partial = GalleryConfig::from_lookup(lookup(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
        ]))
        .unwrap();
        assert_eq!(partial.credentials, CredentialConfig::None);

        let full = GalleryConfig::from_lookup(lookup(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_REFRESH_TOKEN", "refresh"),
        ]))
        .unwrap();
        assert_eq!(full.credentials.kind(), "oauth-refresh-token");
    }

    #[test]
    fn test_from_lookup_numeric_and_mode() {
        let config = GalleryConfig::from_lookup(lookup(&[
            ("GALLERY_PREVIEW_MODE", "clip"),
            ("GALLERY_MAX_CONCURRENCY", "4"),
            ("GALLERY_DOWNLOAD_TIMEOUT_SECS", "30"),
            ("FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg"),
        ]))
        .unwrap();

        assert_eq!(config.preview_flavor, PreviewFlavor::Clip);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.download_timeout, Duration::from_secs(30));
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result = GalleryConfig::from_lookup(lookup(&[("GALLERY_MAX_CONCURRENCY", "many")]));
        assert!(matches!(result, Err(Error::InvalidValue { .. })));

        let result = GalleryConfig::from_lookup(lookup(&[("GALLERY_PREVIEW_MODE", "gif")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let credentials = CredentialConfig::OAuthRefresh {
            client_id: "client".to_string(),
            client_secret: "very-secret".to_string(),
            refresh_token: "1//refresh".to_string(),
        };
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("client"));
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("1//refresh"));
    }
}
