use std::future::Future;

use reqwest::Url;

/// Error type for the interactive browser surface
#[derive(Debug)]
pub enum HostError {
    Unavailable(String),
    Failed(String),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::Unavailable(msg) => write!(f, "Browser surface unavailable: {}", msg),
            HostError::Failed(msg) => write!(f, "Browser surface failed: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

/// How an interactive presentation ended
#[derive(Debug, Clone)]
pub enum HostOutcome {
    /// The surface observed a navigation matching the callback prefix
    Callback(Url),
    /// The user closed the surface without completing the interaction
    Dismissed,
}

/// Interactive browser surface provided by the presentation layer
///
/// Presents a URL modally and resolves once a callback URL is intercepted or
/// the user dismisses the surface. Serves both the OAuth authorization step
/// and the third-party picker UI.
pub trait InteractionHost: Send + Sync {
    fn present_url(
        &self,
        url: Url,
        callback_prefix: &str,
    ) -> impl Future<Output = Result<HostOutcome, HostError>> + Send;
}
