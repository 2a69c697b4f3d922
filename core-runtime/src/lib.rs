//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the gallery sync crates:
//! - Logging and tracing setup
//! - Environment-driven configuration with fail-fast validation
//! - Event bus for sync and runner lifecycle events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CredentialConfig, GalleryConfig, PreviewFlavor};
pub use error::{Error, Result};
