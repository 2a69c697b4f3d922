//! # Host Bridge Traits
//!
//! Capability traits the sync engine depends on, implemented per host.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync core and the concrete
//! adapters that talk to the outside world. Each trait represents a capability
//! that the core requires but that is implemented elsewhere (desktop adapters
//! live in `bridge-desktop`, the Google Drive adapter in `provider-google-drive`,
//! and tests substitute in-memory fakes).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and streaming
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Local file I/O used for videos, previews and the manifest
//! - [`StorageProvider`](storage::StorageProvider) - Remote folder listing and content download
//!
//! ### Media
//! - [`Transcoder`](transcode::Transcoder) - Derives preview assets from a source video
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Adapters
//! should convert their native errors into `BridgeError` and include enough
//! context (file path, HTTP status, tool stderr) for the message to be actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared behind `Arc`
//! across the tasks of a sync run.
//!
//! ## Examples
//!
//! ### Implementing Transcoder
//!
//! ```ignore
//! use bridge_traits::transcode::{Transcoder, TranscodeOptions};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//! use std::path::Path;
//!
//! struct NoopTranscoder;
//!
//! #[async_trait]
//! impl Transcoder for NoopTranscoder {
//!     async fn check_available(&self) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn transcode(&self, source: &Path, output: &Path, options: &TranscodeOptions) -> Result<()> {
//!         tokio::fs::copy(source, output).await?;
//!         Ok(())
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod storage;
pub mod time;
pub mod transcode;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{ContentStream, FileMetadata, FileSystemAccess, RemoteFile, StorageProvider};
pub use time::{Clock, LogLevel, SystemClock};
pub use transcode::{TranscodeOptions, Transcoder};
