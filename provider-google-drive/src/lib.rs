//! # Google Drive Provider
//!
//! Implements `StorageProvider` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Paginated listing of the direct children of one folder
//! - Streaming media downloads
//! - Rate limiting and exponential backoff
//!
//! Authentication is delegated to a [`core_auth::TokenProvider`].

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleDriveConnector;
pub use error::{GoogleDriveError, Result};

