//! Transcoding Abstraction
//!
//! The sync engine never shells out directly; it asks a [`Transcoder`] to
//! derive an output file from a source file plus a set of encoding options.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Encoding parameters for a single transcode invocation.
///
/// Every field is optional; unset fields leave the tool's defaults in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscodeOptions {
    /// Only encode the first `duration` of the source
    pub duration: Option<Duration>,
    /// Output frame rate
    pub frame_rate: Option<u32>,
    /// Filter graph applied to the video stream
    pub video_filter: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    /// Drop the audio stream entirely
    pub strip_audio: bool,
    /// Codec-specific quality setting
    pub quality: Option<u32>,
    /// Codec-specific preset name
    pub preset: Option<String>,
    /// Loop count for animated image formats (0 = forever)
    pub loop_count: Option<u32>,
    /// Container format, when it cannot be inferred from the output extension
    pub format: Option<String>,
}

impl TranscodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = Some(fps);
        self
    }

    pub fn video_filter(mut self, filter: impl Into<String>) -> Self {
        self.video_filter = Some(filter.into());
        self
    }

    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = Some(codec.into());
        self
    }

    pub fn audio_codec(mut self, codec: impl Into<String>) -> Self {
        self.audio_codec = Some(codec.into());
        self
    }

    pub fn strip_audio(mut self) -> Self {
        self.strip_audio = true;
        self.audio_codec = None;
        self
    }

    pub fn quality(mut self, quality: u32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    pub fn loop_count(mut self, count: u32) -> Self {
        self.loop_count = Some(count);
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// External media transcoder.
///
/// Implementations must either produce a complete file at `output` and return
/// `Ok(())`, or return an error. Callers remove whatever is left at `output`
/// after an error.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Verify the underlying tool can be invoked at all
    ///
    /// Called once at startup; an error here is a fatal configuration problem.
    async fn check_available(&self) -> Result<()>;

    /// Derive `output` from `source`
    async fn transcode(
        &self,
        source: &Path,
        output: &Path,
        options: &TranscodeOptions,
    ) -> Result<()>;
}
