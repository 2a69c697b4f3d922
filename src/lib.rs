//! Workspace facade crate.
//!
//! Re-exports the workspace crates that make up the video gallery sync engine
//! so hosts can depend on `video-gallery-sync` alone. The `desktop` feature
//! (enabled by default) pulls in the reqwest/tokio/ffmpeg adapters.

pub use bridge_traits as bridge;
pub use core_auth as auth;
pub use core_runtime as runtime;
pub use core_sync as sync;
pub use provider_google_drive as google_drive;

#[cfg(feature = "desktop")]
pub use bridge_desktop as desktop;
