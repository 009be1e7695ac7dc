use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single OAuth credential owned by the token authority
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// An expired credential must be refreshed before its access token is used
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Authentication state observed by the presentation layer
///
/// `Unknown` is the only valid initial state; it resolves to `SignedOut` or
/// `SignedIn` once the credential store has been consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unknown,
    SignedOut,
    SignedIn,
}

/// Static OAuth client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuthConfig {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_endpoint")]
    pub auth_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_revoke_endpoint")]
    pub revoke_endpoint: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_auth_endpoint() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_endpoint() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_revoke_endpoint() -> String {
    "https://oauth2.googleapis.com/revoke".to_string()
}

fn default_redirect_uri() -> String {
    "wallshift://oauth/callback".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/photospicker.mediaitems.readonly".to_string()]
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            auth_endpoint: default_auth_endpoint(),
            token_endpoint: default_token_endpoint(),
            revoke_endpoint: default_revoke_endpoint(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
        }
    }
}

/// Response from the token endpoint for both the code exchange and the
/// refresh-token grant
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}
