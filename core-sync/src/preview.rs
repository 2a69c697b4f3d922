//! # Preview Generator
//!
//! Derives one preview asset per video through a [`Transcoder`].
//!
//! Two flavors exist:
//!
//! | Flavor | Output | Encoding |
//! |--------|--------|----------|
//! | [`PreviewFlavor::Clip`] | `previews/preview_<name>` | first 0.5s, H.264 + AAC in an mp4 container |
//! | [`PreviewFlavor::Thumbnail`] | `thumbs/<name>.webp` | first 0.5s at 30fps, 540x960 letterboxed, looping WebP, no audio |
//!
//! Generation is skipped when a preview exists and either its cache entry
//! fingerprint still matches the source, or the preview is strictly newer
//! than the source.

use crate::cache::CacheEntry;
use crate::error::{Result, SyncError};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::Clock;
use bridge_traits::transcode::{TranscodeOptions, Transcoder};
use chrono::{DateTime, Utc};
use core_runtime::config::PreviewFlavor;
use core_runtime::logging::strip_path;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const PREVIEW_DURATION: Duration = Duration::from_millis(500);

const THUMBNAIL_FILTER: &str =
    "scale=540:960:force_original_aspect_ratio=decrease:flags=lanczos,pad=540:960:-1:-1:color=black";

/// Result of [`PreviewGenerator::ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// The existing preview is still valid; no transcode happened
    Reused,
    /// A new preview was written; the entry should replace the cached one
    Generated { entry: CacheEntry },
}

/// File name of the preview derived from `video_name`.
///
/// The full name, extension included, is kept so that `a.mp4` and `a.mov`
/// never share a preview.
pub fn derived_file_name(flavor: PreviewFlavor, video_name: &str) -> String {
    match flavor {
        PreviewFlavor::Clip => format!("preview_{}", video_name),
        PreviewFlavor::Thumbnail => format!("{}.webp", video_name),
    }
}

/// Encoding preset for a flavor.
pub fn transcode_options(flavor: PreviewFlavor) -> TranscodeOptions {
    match flavor {
        PreviewFlavor::Clip => TranscodeOptions::new()
            .duration(PREVIEW_DURATION)
            .video_codec("libx264")
            .audio_codec("aac")
            .format("mp4"),
        PreviewFlavor::Thumbnail => TranscodeOptions::new()
            .video_filter(THUMBNAIL_FILTER)
            .loop_count(0)
            .duration(PREVIEW_DURATION)
            .frame_rate(30)
            .video_codec("libwebp")
            .quality(85)
            .preset("default")
            .strip_audio(),
    }
}

/// Hex SHA-256 of `path:size:mtime_millis`.
///
/// Any change to the location, length or modification time of the source
/// changes the fingerprint.
pub fn fingerprint(path: &Path, size: u64, modified_at: Option<DateTime<Utc>>) -> String {
    let millis = modified_at.map(|t| t.timestamp_millis()).unwrap_or(0);
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", path.display(), size, millis).as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Generates previews for one flavor into one directory.
pub struct PreviewGenerator {
    transcoder: Arc<dyn Transcoder>,
    fs: Arc<dyn FileSystemAccess>,
    clock: Arc<dyn Clock>,
    flavor: PreviewFlavor,
    output_dir: PathBuf,
    timeout: Duration,
}

impl PreviewGenerator {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        fs: Arc<dyn FileSystemAccess>,
        clock: Arc<dyn Clock>,
        flavor: PreviewFlavor,
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            transcoder,
            fs,
            clock,
            flavor,
            output_dir: output_dir.into(),
            timeout,
        }
    }

    pub fn flavor(&self) -> PreviewFlavor {
        self.flavor
    }

    /// Where the preview of `video_name` lives.
    pub fn derived_path(&self, video_name: &str) -> PathBuf {
        self.output_dir
            .join(derived_file_name(self.flavor, video_name))
    }

    /// Make sure a valid preview exists for `source`.
    ///
    /// # Errors
    ///
    /// [`SyncError::Transcode`] when the source cannot be read, the transcoder
    /// fails, or it exceeds the timeout. Partial output is removed.
    #[instrument(
        skip(self, cached),
        fields(source = %strip_path(&source.to_string_lossy()))
    )]
    pub async fn ensure(&self, source: &Path, cached: Option<&CacheEntry>) -> Result<PreviewOutcome> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let source_meta = self
            .fs
            .metadata(source)
            .await
            .map_err(|e| SyncError::transcode(&name, e))?;
        let hash = fingerprint(source, source_meta.size, source_meta.modified_at);

        let output = self.derived_path(&name);
        let derived_meta = self
            .fs
            .try_metadata(&output)
            .await
            .map_err(|e| SyncError::transcode(&name, e))?;

        if let Some(derived) = derived_meta {
            let hash_matches = cached.map(|entry| entry.hash == hash).unwrap_or(false);
            let newer_than_source = match (derived.modified_at, source_meta.modified_at) {
                (Some(derived_time), Some(source_time)) => derived_time > source_time,
                _ => false,
            };

            if hash_matches || newer_than_source {
                debug!(hash_matches, newer_than_source, "Preview up to date");
                return Ok(PreviewOutcome::Reused);
            }
        }

        info!(
            preview = %strip_path(&output.to_string_lossy()),
            "Generating preview"
        );
        let options = transcode_options(self.flavor);
        let result = tokio::time::timeout(
            self.timeout,
            self.transcoder.transcode(source, &output, &options),
        )
        .await;

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {}s", self.timeout.as_secs())),
        };

        if let Some(reason) = failure {
            if let Err(e) = self.fs.delete_file(&output).await {
                if !e.is_not_found() {
                    warn!(error = %e, "Failed to remove partial preview");
                }
            }
            return Err(SyncError::transcode(&name, reason));
        }

        Ok(PreviewOutcome::Generated {
            entry: CacheEntry {
                hash,
                generated: self.clock.now(),
            },
        })
    }
}
