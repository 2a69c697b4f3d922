//! # Gallery Sync
//!
//! Mirrors a remote video folder into a local gallery root and publishes the
//! `videos.json` manifest consumed by the gallery front end.
//!
//! ## Components
//!
//! - **Remote Lister** (`lister`): pages a [`StorageProvider`] folder and keeps the videos
//! - **Change Detector** (`detector`): decides whether a remote file must be fetched
//! - **Fetcher** (`fetcher`): streams downloads to a `.part` file and renames into place
//! - **Preview Cache** (`cache`): per-video source fingerprints in `.thumb-cache.json`
//! - **Preview Generator** (`preview`): clip or animated thumbnail through a [`Transcoder`]
//! - **Manifest Writer** (`manifest`): sorted records, atomic publish
//! - **Reconciler** (`reconciler`): opt-in removal of videos gone remotely
//! - **Sync Pipeline** (`pipeline`): one complete pass, with demo-mode fallback
//! - **Continuous Runner** (`runner`): repeats the pipeline until shutdown
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncPipeline;
//! use std::sync::Arc;
//!
//! let pipeline = SyncPipeline::new(config, fs, transcoder, event_bus)
//!     .with_provider(drive);
//! let report = pipeline.run(false).await?;
//! println!("{} videos published", report.manifest.count);
//! ```
//!
//! [`StorageProvider`]: bridge_traits::storage::StorageProvider
//! [`Transcoder`]: bridge_traits::transcode::Transcoder

pub mod cache;
pub mod detector;
pub mod error;
pub mod fetcher;
pub mod lister;
pub mod manifest;
pub mod pipeline;
pub mod preview;
pub mod reconciler;
pub mod runner;

pub use cache::{CacheEntry, PreviewCache};
pub use detector::{ChangeDetector, ChangeStatus};
pub use error::{Result, SyncError};
pub use fetcher::Fetcher;
pub use lister::{RemoteLister, SUPPORTED_EXTENSIONS};
pub use manifest::{generate_title, Manifest, ManifestRecord};
pub use pipeline::{SyncPipeline, SyncReport};
pub use preview::{fingerprint, PreviewGenerator, PreviewOutcome};
pub use reconciler::Reconciler;
pub use runner::ContinuousRunner;
