//! # Photos Picker
//!
//! A client library for a session-based, human-in-the-loop photo picker API.
//!
//! This crate provides:
//! - Picker session creation and status polling
//! - Bounded waiting for user-driven selection completion
//! - Paginated media-item fetching with domain-model conversion
//! - Authenticated image downloads with retry and a local blob cache
//!
//! ## Separation of Concerns
//!
//! This crate focuses on the picker protocol and image transfer. It does
//! **not** manage OAuth credentials: callers supply a [`BearerTokenProvider`]
//! that yields a valid token per call (the `photos-auth` crate implements
//! the credential lifecycle behind it).
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use photos_picker::PickerSessionClient;
//!
//! let client = PickerSessionClient::new(base_url, tokens)?;
//! let session = client.create_session(Some(50)).await?;
//! // hand session.picker_uri to a browser surface, then:
//! let photos = client.wait_for_selection(&session.id).await?;
//! ```

pub mod cache;
pub mod download;
pub mod models;
pub mod selection;
pub mod session;
pub mod token;

pub use cache::{BlobCache, CacheError, FsBlobCache};
pub use download::{DownloadError, DownloadResult, ImageFetcher, RetryConfig};
pub use models::{Photo, PhotoMetadata, PhotoQuality, PickerSession};
pub use selection::SelectionSet;
pub use session::{PickerError, PickerSessionClient, PollConfig};
pub use token::{BearerTokenProvider, TokenProviderError};
