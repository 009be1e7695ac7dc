//! Authenticated photo downloads with a local blob cache
//!
//! Full-resolution bytes are cached by photo id so rotation does not re-fetch
//! the same image every cycle; thumbnails are small and always fetched fresh.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{BlobCache, CacheError};
use crate::models::{Photo, PhotoQuality};
use crate::token::{BearerTokenProvider, TokenProviderError};

const USER_AGENT: &str = concat!("PhotosPicker/", env!("CARGO_PKG_VERSION"));

/// Result type for download operations
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that can occur during photo download
#[derive(Debug)]
pub enum DownloadError {
    /// Non-200 HTTP response; the status says why (auth, not found, quota)
    DownloadFailed(u16),
    NetworkError(String),
    Cache(CacheError),
    TokenUnavailable(String),
}

impl std::fmt::Display for DownloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadError::DownloadFailed(status) => {
                write!(f, "Image download failed with status {}", status)
            }
            DownloadError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DownloadError::Cache(e) => write!(f, "{}", e),
            DownloadError::TokenUnavailable(msg) => write!(f, "Bearer token unavailable: {}", msg),
        }
    }
}

impl std::error::Error for DownloadError {}

impl From<CacheError> for DownloadError {
    fn from(err: CacheError) -> Self {
        DownloadError::Cache(err)
    }
}

impl From<TokenProviderError> for DownloadError {
    fn from(err: TokenProviderError) -> Self {
        DownloadError::TokenUnavailable(err.0)
    }
}

/// Retry parameters for transport-level failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
        }
    }
}

/// Downloads photo bytes authenticated through a bearer-token provider
pub struct ImageFetcher<T: BearerTokenProvider, C: BlobCache> {
    http: reqwest::Client,
    tokens: T,
    cache: C,
    retry: RetryConfig,
}

impl<T: BearerTokenProvider, C: BlobCache> ImageFetcher<T, C> {
    pub fn new(tokens: T, cache: C) -> DownloadResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DownloadError::NetworkError(format!("Client build failed: {}", e)))?;

        Ok(Self {
            http,
            tokens,
            cache,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Download photo bytes at the requested quality.
    ///
    /// Full-resolution requests are answered from the blob cache when
    /// possible, without touching the network or the token provider.
    pub async fn download(&self, photo: &Photo, quality: PhotoQuality) -> DownloadResult<Vec<u8>> {
        if quality == PhotoQuality::FullResolution {
            if let Some(location) = self.cache.get(&photo.id) {
                log::debug!("Cache hit for photo {}", photo.id);
                return std::fs::read(&location)
                    .map_err(|e| DownloadError::Cache(CacheError::ReadFailed(e)));
            }
        }

        let url = match quality {
            PhotoQuality::Thumbnail => photo.thumbnail_url(),
            PhotoQuality::FullResolution => photo.full_resolution_url(),
        };

        let bytes = self.fetch_with_retry(&url).await?;
        if quality == PhotoQuality::FullResolution {
            self.cache.put(&photo.id, &bytes)?;
        }
        Ok(bytes)
    }

    /// Local file location of the full-resolution image, downloading and
    /// caching it first if necessary. This is what the display layer applies.
    pub async fn full_resolution_file(&self, photo: &Photo) -> DownloadResult<PathBuf> {
        if let Some(location) = self.cache.get(&photo.id) {
            log::debug!("Cache hit for photo {}", photo.id);
            return Ok(location);
        }

        let bytes = self.fetch_with_retry(&photo.full_resolution_url()).await?;
        Ok(self.cache.put(&photo.id, &bytes)?)
    }

    async fn fetch_with_retry(&self, url: &str) -> DownloadResult<Vec<u8>> {
        let token = self.tokens.bearer_token().await?;
        let mut attempt = 0;

        loop {
            match self.fetch_once(url, &token).await {
                Ok(bytes) => return Ok(bytes),
                // HTTP error statuses are not retried: a blind retry cannot
                // fix an auth, not-found or quota failure.
                Err(e @ DownloadError::DownloadFailed(_)) => return Err(e),
                Err(e) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    let backoff = calculate_backoff(&self.retry, attempt);
                    log::warn!(
                        "Image download failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt,
                        self.retry.max_retries,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str, token: &str) -> DownloadResult<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| DownloadError::NetworkError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(DownloadError::DownloadFailed(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::NetworkError(format!("Failed to read bytes: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// Exponential backoff in the attempt count, with jitter
fn calculate_backoff(retry: &RetryConfig, attempt: u32) -> Duration {
    use rand::Rng;

    let base = retry.backoff_base * (1u32 << (attempt - 1).min(4));
    let jitter_ms = rand::rng().random_range(0..=(base.as_millis() as u64) / 2);
    base + Duration::from_millis(jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FsBlobCache;

    /// Provider that fails loudly if the fetcher asks for a token
    struct NoTokenExpected;

    impl BearerTokenProvider for NoTokenExpected {
        async fn bearer_token(&self) -> Result<String, TokenProviderError> {
            Err(TokenProviderError(
                "no token should be needed for a cache hit".to_string(),
            ))
        }
    }

    struct StaticToken;

    impl BearerTokenProvider for StaticToken {
        async fn bearer_token(&self) -> Result<String, TokenProviderError> {
            Ok("token".to_string())
        }
    }

    fn temp_cache(name: &str) -> FsBlobCache {
        let root = std::env::temp_dir().join(format!(
            "photos-picker-fetcher-{}-{}",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_dir_all(&root);
        FsBlobCache::new(root).unwrap()
    }

    fn photo(id: &str) -> Photo {
        Photo {
            id: id.to_string(),
            // Nothing listens here, so any network attempt fails fast
            base_url: "http://127.0.0.1:9/media".to_string(),
            filename: "p.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            metadata: None,
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            backoff_base: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_full_resolution_cache_hit_skips_network_and_token() {
        let cache = temp_cache("hit");
        cache.put("p1", b"cached bytes").unwrap();

        let fetcher = ImageFetcher::new(NoTokenExpected, cache).unwrap();
        let bytes = fetcher
            .download(&photo("p1"), PhotoQuality::FullResolution)
            .await
            .unwrap();
        assert_eq!(bytes, b"cached bytes");

        let location = fetcher.full_resolution_file(&photo("p1")).await.unwrap();
        assert_eq!(std::fs::read(location).unwrap(), b"cached bytes");
    }

    #[tokio::test]
    async fn test_thumbnail_never_reads_the_cache() {
        let cache = temp_cache("thumb");
        cache.put("p1", b"cached bytes").unwrap();

        let fetcher =
            ImageFetcher::new(StaticToken, cache).unwrap().with_retry_config(fast_retry());
        // The cached blob must not satisfy a thumbnail request; with no
        // reachable host the download fails instead.
        let result = fetcher.download(&photo("p1"), PhotoQuality::Thumbnail).await;
        assert!(matches!(result, Err(DownloadError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_after_retries() {
        let fetcher = ImageFetcher::new(StaticToken, temp_cache("retries"))
            .unwrap()
            .with_retry_config(fast_retry());
        let result = fetcher
            .download(&photo("p2"), PhotoQuality::FullResolution)
            .await;
        assert!(matches!(result, Err(DownloadError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_token_failure_is_not_retried() {
        let fetcher = ImageFetcher::new(NoTokenExpected, temp_cache("token"))
            .unwrap()
            .with_retry_config(fast_retry());
        let result = fetcher
            .download(&photo("p3"), PhotoQuality::FullResolution)
            .await;
        assert!(matches!(result, Err(DownloadError::TokenUnavailable(_))));
    }

    #[test]
    fn test_backoff_grows_with_attempts() {
        let retry = RetryConfig {
            max_retries: 3,
            backoff_base: Duration::from_millis(100),
        };
        let first = calculate_backoff(&retry, 1);
        let third = calculate_backoff(&retry, 3);
        assert!(first >= Duration::from_millis(100));
        assert!(third >= Duration::from_millis(400));
    }
}
