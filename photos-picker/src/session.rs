//! Remote picker-session client
//!
//! The selection UI is rendered by a third party outside this system's
//! control, so completion is never a callback: it is inferred by polling the
//! session until the server reports that media items are ready.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use crate::models::{CreateSessionRequest, MediaItemsResponse, Photo, PickerSession, SessionResponse};
use crate::token::{BearerTokenProvider, TokenProviderError};

const USER_AGENT: &str = concat!("PhotosPicker/", env!("CARGO_PKG_VERSION"));

/// Error type for picker operations
#[derive(Debug)]
pub enum PickerError {
    SessionCreationFailed(u16),
    /// Terminal: an expired session cannot be retried, only recreated
    SessionExpired,
    /// The poll budget ran out before the user completed selection
    SelectionTimedOut,
    MediaItemsFetchFailed(u16),
    InvalidResponse(String),
    UserCancelled,
    NetworkError(String),
    TokenUnavailable(String),
}

impl std::fmt::Display for PickerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PickerError::SessionCreationFailed(status) => {
                write!(f, "Picker session creation failed with status {}", status)
            }
            PickerError::SessionExpired => write!(f, "Picker session expired"),
            PickerError::SelectionTimedOut => write!(f, "Timed out waiting for photo selection"),
            PickerError::MediaItemsFetchFailed(status) => {
                write!(f, "Fetching selected media items failed with status {}", status)
            }
            PickerError::InvalidResponse(msg) => write!(f, "Invalid picker response: {}", msg),
            PickerError::UserCancelled => write!(f, "Photo selection was cancelled"),
            PickerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            PickerError::TokenUnavailable(msg) => write!(f, "Bearer token unavailable: {}", msg),
        }
    }
}

impl std::error::Error for PickerError {}

impl From<TokenProviderError> for PickerError {
    fn from(err: TokenProviderError) -> Self {
        PickerError::TokenUnavailable(err.0)
    }
}

/// Polling parameters for selection completion
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

/// Client for the session-based picker API
pub struct PickerSessionClient<T: BearerTokenProvider> {
    base_url: String,
    http: reqwest::Client,
    tokens: T,
    poll: PollConfig,
}

impl<T: BearerTokenProvider> PickerSessionClient<T> {
    pub fn new(base_url: String, tokens: T) -> Result<Self, PickerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PickerError::NetworkError(format!("Client build failed: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            tokens,
            poll: PollConfig::default(),
        })
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Create a fresh picker session, optionally capping the number of items
    /// the user may select
    pub async fn create_session(
        &self,
        max_item_count: Option<u32>,
    ) -> Result<PickerSession, PickerError> {
        let token = self.tokens.bearer_token().await?;
        let url = format!("{}/sessions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&CreateSessionRequest { max_item_count })
            .send()
            .await
            .map_err(|e| PickerError::NetworkError(format!("Session creation failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Session creation returned status {}", status);
            return Err(PickerError::SessionCreationFailed(status.as_u16()));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PickerError::InvalidResponse(format!("Bad session response: {}", e)))?;
        log::info!("Created picker session {}", session.id);
        Ok(session.into_session())
    }

    /// Fetch the current status of a session.
    ///
    /// A picker session is tied to a specific token's authorization, so
    /// 401/403/404 all mean the same thing here: the session is gone.
    pub async fn get_session(&self, id: &str) -> Result<PickerSession, PickerError> {
        let token = self.tokens.bearer_token().await?;
        let url = format!("{}/sessions/{}", self.base_url, id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| PickerError::NetworkError(format!("Session poll failed: {}", e)))?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 | 404 => return Err(PickerError::SessionExpired),
            _ if !status.is_success() => {
                return Err(PickerError::InvalidResponse(format!(
                    "session status returned {}",
                    status
                )))
            }
            _ => {}
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| PickerError::InvalidResponse(format!("Bad session response: {}", e)))?;
        Ok(session.into_session())
    }

    /// Page through the media items selected in a completed session.
    ///
    /// Items without a usable base URL are dropped, and duplicates by id are
    /// removed while preserving selection order.
    pub async fn fetch_media_items(&self, id: &str) -> Result<Vec<Photo>, PickerError> {
        let mut photos = Vec::new();
        let mut seen = HashSet::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.tokens.bearer_token().await?;
            let url = format!("{}/mediaItems", self.base_url);
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(&[("sessionId", id)]);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let response = request.send().await.map_err(|e| {
                PickerError::NetworkError(format!("Media items fetch failed: {}", e))
            })?;

            let status = response.status();
            match status.as_u16() {
                401 | 403 | 404 => return Err(PickerError::SessionExpired),
                s if !status.is_success() => return Err(PickerError::MediaItemsFetchFailed(s)),
                _ => {}
            }

            let page: MediaItemsResponse = response.json().await.map_err(|e| {
                PickerError::InvalidResponse(format!("Bad media items response: {}", e))
            })?;

            for item in page.media_items {
                let id = item.id.clone();
                match item.into_photo() {
                    Some(photo) => {
                        if seen.insert(photo.id.clone()) {
                            photos.push(photo);
                        }
                    }
                    None => log::debug!("Dropping media item {} without base URL", id),
                }
            }

            page_token = page.next_page_token;
            if page_token.as_deref().map_or(true, str::is_empty) {
                break;
            }
        }

        log::info!("Fetched {} media items", photos.len());
        Ok(photos)
    }

    /// Poll the session until the user finishes selecting, then fetch the
    /// resulting photos.
    ///
    /// The external UI may simply be closed by the user without any signal
    /// reaching this system, so the wait is bounded: exhausting the attempt
    /// budget fails with [`PickerError::SelectionTimedOut`]. The returned
    /// future is cancel-safe; dropping it abandons the poll.
    pub async fn wait_for_selection(&self, id: &str) -> Result<Vec<Photo>, PickerError> {
        poll_until_ready(&self.poll, move || async move {
            Ok(self.get_session(id).await?.media_ready)
        })
        .await?;
        self.fetch_media_items(id).await
    }
}

/// Bounded poll loop. Any transport error aborts immediately; retrying is the
/// enclosing flow's concern, not the loop's.
async fn poll_until_ready<F, Fut>(config: &PollConfig, mut probe: F) -> Result<(), PickerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, PickerError>>,
{
    for attempt in 1..=config.max_attempts {
        log::debug!("Selection poll attempt {}/{}", attempt, config.max_attempts);
        if probe().await? {
            return Ok(());
        }
        tokio::time::sleep(config.interval).await;
    }
    Err(PickerError::SelectionTimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_poll(max_attempts: u32) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_poll_returns_once_ready() {
        let calls = &AtomicU32::new(0);
        let result = poll_until_ready(&fast_poll(10), move || async move {
            Ok(calls.fetch_add(1, Ordering::SeqCst) + 1 >= 3)
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_budget_exhaustion_times_out() {
        let calls = &AtomicU32::new(0);
        let result = poll_until_ready(&fast_poll(5), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        })
        .await;

        assert!(matches!(result, Err(PickerError::SelectionTimedOut)));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_poll_aborts_on_first_transport_error() {
        let calls = &AtomicU32::new(0);
        let result = poll_until_ready(&fast_poll(10), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PickerError::NetworkError("connection reset".to_string()))
        })
        .await;

        assert!(matches!(result, Err(PickerError::NetworkError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_propagates_session_expiry() {
        let result = poll_until_ready(&fast_poll(10), || async {
            Err(PickerError::SessionExpired)
        })
        .await;
        assert!(matches!(result, Err(PickerError::SessionExpired)));
    }
}
