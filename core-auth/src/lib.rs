//! # Authentication Module
//!
//! Google credentials for read-only Drive access.
//!
//! ## Overview
//!
//! Two grant types are supported:
//!
//! - Service accounts, from a key file or inline JSON, using a signed RS256
//!   assertion ([`service_account`])
//! - Installed-app OAuth clients with a stored refresh token ([`oauth`])
//!
//! Both are exposed through [`TokenProvider`], which caches the access token
//! and refreshes it shortly before expiry. Use [`token_provider_for`] to build
//! one from a [`core_runtime::config::CredentialConfig`].

pub mod error;
pub mod oauth;
pub mod provider;
pub mod service_account;
pub mod types;

pub use error::{AuthError, Result};
pub use oauth::{OAuthConfig, RefreshTokenFlow};
pub use provider::{token_provider_for, CachingTokenProvider, TokenProvider, TokenSource};
pub use service_account::{ServiceAccountFlow, ServiceAccountKey};
pub use types::{OAuthTokens, DRIVE_READONLY_SCOPE};
