use std::future::Future;

/// Error type for bearer-token acquisition
#[derive(Debug)]
pub struct TokenProviderError(pub String);

impl std::fmt::Display for TokenProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bearer token unavailable: {}", self.0)
    }
}

impl std::error::Error for TokenProviderError {}

/// Per-call source of bearer tokens
///
/// Every picker and download call asks for a token right before the request;
/// implementors own refresh, callers never cache tokens beyond the call.
pub trait BearerTokenProvider: Send + Sync {
    fn bearer_token(&self) -> impl Future<Output = Result<String, TokenProviderError>> + Send;
}
