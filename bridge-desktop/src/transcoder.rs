//! Transcoder Implementation backed by the `ffmpeg` binary

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    transcode::{TranscodeOptions, Transcoder},
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Lines of ffmpeg stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 8;

/// Runs `ffmpeg` as a child process for each transcode.
///
/// The child is killed if the returned future is dropped, so a caller-side
/// timeout also terminates the process.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    /// Use `ffmpeg` from `PATH`
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Use a specific ffmpeg executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Build the ffmpeg argument list for one invocation
    fn build_args(source: &Path, output: &Path, options: &TranscodeOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];
        args.push("-i".into());
        args.push(source.as_os_str().to_owned());

        if let Some(filter) = &options.video_filter {
            args.push("-vf".into());
            args.push(filter.into());
        }
        if let Some(count) = options.loop_count {
            args.push("-loop".into());
            args.push(count.to_string().into());
        }
        if let Some(duration) = options.duration {
            args.push("-t".into());
            args.push(format!("{}", duration.as_secs_f64()).into());
        }
        if let Some(fps) = options.frame_rate {
            args.push("-r".into());
            args.push(fps.to_string().into());
        }
        if let Some(codec) = &options.video_codec {
            args.push("-c:v".into());
            args.push(codec.into());
        }
        if let Some(quality) = options.quality {
            args.push("-quality".into());
            args.push(quality.to_string().into());
        }
        if let Some(preset) = &options.preset {
            args.push("-preset".into());
            args.push(preset.into());
        }
        if options.strip_audio {
            args.push("-an".into());
        } else if let Some(codec) = &options.audio_codec {
            args.push("-c:a".into());
            args.push(codec.into());
        }
        if let Some(format) = &options.format {
            args.push("-f".into());
            args.push(format.into());
        }

        args.push("-y".into());
        args.push(output.as_os_str().to_owned());
        args
    }

    fn stderr_tail(stderr: &[u8]) -> String {
        let text = String::from_utf8_lossy(stderr);
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        lines[start..].join("\n")
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn check_available(&self) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                BridgeError::NotAvailable(format!(
                    "failed to run {} -version: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(BridgeError::NotAvailable(format!(
                "{} exists but returned {} on -version",
                self.program.display(),
                output.status
            )));
        }

        let banner = String::from_utf8_lossy(&output.stdout);
        debug!(
            version = banner.lines().next().unwrap_or_default(),
            "ffmpeg available"
        );
        Ok(())
    }

    #[instrument(skip(self, options), fields(source = %source.display()))]
    async fn transcode(
        &self,
        source: &Path,
        output: &Path,
        options: &TranscodeOptions,
    ) -> Result<()> {
        let args = Self::build_args(source, output, options);
        debug!(?args, "Running ffmpeg");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                BridgeError::NotAvailable(format!(
                    "failed to spawn {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !result.status.success() {
            let tail = Self::stderr_tail(&result.stderr);
            warn!(status = %result.status, "ffmpeg failed");
            return Err(BridgeError::OperationFailed(format!(
                "ffmpeg exited with {}: {}",
                result.status, tail
            )));
        }

        Ok(())
    }
}
