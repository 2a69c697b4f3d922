//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` (rustls, retry with backoff, streaming bodies)
//! - `FileSystemAccess` using `tokio::fs`
//! - `Transcoder` using the `ffmpeg` executable via `tokio::process`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FfmpegTranscoder, ReqwestHttpClient, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let fs = TokioFileSystem::new();
//!     let transcoder = FfmpegTranscoder::new();
//!     transcoder.check_available().await?;
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;
mod transcoder;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use transcoder::FfmpegTranscoder;
