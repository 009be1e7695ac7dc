//! # Photos Auth
//!
//! A reusable OAuth 2.0 authorization-code + PKCE client library.
//!
//! This crate provides:
//! - PKCE verifier/challenge generation (RFC 7636)
//! - Interactive sign-in through a pluggable browser surface
//! - Silent refresh-on-demand with single-flight coalescing
//! - Best-effort token revocation on sign-out
//! - Eager invalidation of credentials granted under retired scopes
//!
//! ## Separation of Concerns
//!
//! This crate focuses solely on the credential lifecycle. It does **not**:
//! - Persist credentials itself (the application supplies a [`CredentialStore`])
//! - Render any UI (the application supplies an [`InteractionHost`])
//! - Talk to the photo API (handled by the `photos-picker` crate)
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use photos_auth::{OAuthConfig, TokenAuthority};
//!
//! let authority = TokenAuthority::new(config, store)?;
//! authority.initialize()?;
//! authority.sign_in(&host).await?;
//! let bearer = authority.refresh_token_if_needed().await?;
//! ```

pub mod host;
pub mod models;
pub mod pkce;
pub mod service;
pub mod store;

pub use host::{HostError, HostOutcome, InteractionHost};
pub use models::{AuthState, Credential, OAuthConfig, TokenResponse};
pub use pkce::PkceMaterial;
pub use service::{AuthError, TokenAuthority, SCOPE_GENERATION};
pub use store::{CredentialStore, StoreError};

pub use reqwest::Url;
