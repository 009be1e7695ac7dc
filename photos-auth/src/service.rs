use std::time::Duration;

use chrono::Utc;
use reqwest::Url;
use tokio::sync::{watch, Mutex};

use crate::host::{HostOutcome, InteractionHost};
use crate::models::{AuthState, Credential, OAuthConfig, TokenResponse};
use crate::pkce::{self, PkceMaterial};
use crate::store::{CredentialStore, StoreError};

/// Permission-scope generation granted by the current authorization request.
/// Bump this when a previously requested scope is retired so that credentials
/// granted under the old scope are discarded eagerly instead of failing deep
/// inside unrelated calls.
pub const SCOPE_GENERATION: i64 = 2;

const USER_AGENT: &str = concat!("PhotosAuth/", env!("CARGO_PKG_VERSION"));

/// Error type for authentication operations
#[derive(Debug)]
pub enum AuthError {
    ConfigMissing,
    Cancelled,
    StateMismatch,
    InvalidResponse(String),
    TokenExchangeFailed(u16),
    TokenRefreshFailed(u16),
    NoStoredCredential,
    NetworkError(String),
    Store(StoreError),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::ConfigMissing => {
                write!(f, "OAuth client configuration is missing or invalid")
            }
            AuthError::Cancelled => write!(f, "Sign-in was cancelled"),
            AuthError::StateMismatch => {
                write!(f, "Authorization response state did not match the request")
            }
            AuthError::InvalidResponse(msg) => write!(f, "Invalid authorization response: {}", msg),
            AuthError::TokenExchangeFailed(status) => {
                write!(f, "Token exchange failed with status {}", status)
            }
            AuthError::TokenRefreshFailed(status) => {
                write!(f, "Token refresh failed with status {}", status)
            }
            AuthError::NoStoredCredential => write!(f, "No stored credential"),
            AuthError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AuthError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Store(err)
    }
}

struct Endpoints {
    authorize: Url,
    token: Url,
    revoke: Url,
}

/// Owns the OAuth credential lifecycle: sign-in, silent refresh, sign-out and
/// scope migration. Exactly one instance exists per running application.
pub struct TokenAuthority<S: CredentialStore> {
    config: OAuthConfig,
    endpoints: Endpoints,
    http: reqwest::Client,
    store: S,
    refresh_gate: Mutex<()>,
    auth_state: watch::Sender<AuthState>,
}

impl<S: CredentialStore> TokenAuthority<S> {
    pub fn new(config: OAuthConfig, store: S) -> Result<Self, AuthError> {
        if config.client_id.trim().is_empty() {
            return Err(AuthError::ConfigMissing);
        }

        let endpoints = Endpoints {
            authorize: Url::parse(&config.auth_endpoint).map_err(|_| AuthError::ConfigMissing)?,
            token: Url::parse(&config.token_endpoint).map_err(|_| AuthError::ConfigMissing)?,
            revoke: Url::parse(&config.revoke_endpoint).map_err(|_| AuthError::ConfigMissing)?,
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AuthError::NetworkError(format!("Client build failed: {}", e)))?;

        let (auth_state, _) = watch::channel(AuthState::Unknown);

        Ok(Self {
            config,
            endpoints,
            http,
            store,
            refresh_gate: Mutex::new(()),
            auth_state,
        })
    }

    /// Resolve the initial auth state from the credential store.
    ///
    /// Runs the scope-migration check first: a credential granted under a
    /// retired scope is discarded and the user must re-authenticate.
    pub fn initialize(&self) -> Result<AuthState, AuthError> {
        if self.store.scope_generation()? < SCOPE_GENERATION {
            if self.store.load()?.is_some() {
                log::warn!("Stored credential predates the current permission scope; discarding");
            }
            self.store.migrate_scope_generation(SCOPE_GENERATION)?;
        }

        let state = if self.store.load()?.is_some() {
            AuthState::SignedIn
        } else {
            AuthState::SignedOut
        };
        self.publish(state);
        Ok(state)
    }

    /// Observe auth-state transitions
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.auth_state.subscribe()
    }

    pub fn current_state(&self) -> AuthState {
        *self.auth_state.borrow()
    }

    /// Run the interactive authorization-code + PKCE flow
    pub async fn sign_in<H: InteractionHost>(&self, host: &H) -> Result<(), AuthError> {
        let material = PkceMaterial::generate();
        let authorize_url = self.authorization_url(&material);

        log::info!("Starting interactive sign-in");
        let outcome = host
            .present_url(authorize_url, &self.config.redirect_uri)
            .await
            .map_err(|e| AuthError::NetworkError(format!("{}", e)))?;

        let callback = match outcome {
            HostOutcome::Callback(url) => url,
            HostOutcome::Dismissed => return Err(AuthError::Cancelled),
        };

        let (code, echoed_state) = parse_authorization_callback(&callback)?;
        if echoed_state.as_deref() != Some(material.state.as_str()) {
            return Err(AuthError::StateMismatch);
        }

        let credential = self.exchange_code(&code, &material.verifier).await?;
        self.store.save(&credential)?;
        self.publish(AuthState::SignedIn);
        log::info!("Sign-in completed");
        Ok(())
    }

    /// Return a valid bearer token, refreshing the credential only when the
    /// stored one has expired.
    ///
    /// Safe to call concurrently: callers racing an expired credential
    /// collapse into one refresh request (single-flight), since most
    /// providers invalidate a refresh token after first use.
    pub async fn refresh_token_if_needed(&self) -> Result<String, AuthError> {
        let credential = self.store.load()?.ok_or(AuthError::NoStoredCredential)?;
        if !credential.is_expired() {
            return Ok(credential.access_token);
        }

        let _gate = self.refresh_gate.lock().await;
        // Whoever held the gate before us persisted a fresh credential, so a
        // re-check lets waiters return without a second network call.
        let credential = self.store.load()?.ok_or(AuthError::NoStoredCredential)?;
        if !credential.is_expired() {
            return Ok(credential.access_token);
        }

        self.refresh(credential).await
    }

    /// Revoke the current access token (best effort) and drop local trust
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if let Ok(Some(credential)) = self.store.load() {
            // Local sign-out must complete even when revocation fails.
            let result = self
                .http
                .post(self.endpoints.revoke.clone())
                .form(&[("token", credential.access_token.as_str())])
                .send()
                .await;
            match result {
                Ok(response) if !response.status().is_success() => {
                    log::warn!("Token revocation returned {}", response.status());
                }
                Err(e) => log::warn!("Token revocation failed: {}", e),
                _ => {}
            }
        }

        self.store.delete()?;
        self.publish(AuthState::SignedOut);
        log::info!("Signed out");
        Ok(())
    }

    fn authorization_url(&self, material: &PkceMaterial) -> Url {
        let mut url = self.endpoints.authorize.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("code_challenge", &material.challenge)
            .append_pair("code_challenge_method", pkce::CHALLENGE_METHOD)
            .append_pair("state", &material.state);
        url
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<Credential, AuthError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(self.endpoints.token.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Token exchange failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Token exchange rejected with status {}", status);
            return Err(AuthError::TokenExchangeFailed(status.as_u16()));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("Bad token response: {}", e)))?;
        credential_from_response(token, None)
    }

    async fn refresh(&self, current: Credential) -> Result<String, AuthError> {
        log::debug!("Access token expired; refreshing");

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", current.refresh_token.as_str()),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(self.endpoints.token.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::NetworkError(format!("Token refresh failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            // A rejected refresh token cannot self-heal; drop the session
            // instead of leaving it authenticated-but-broken.
            log::warn!("Token refresh rejected with status {}; signing out", status);
            self.store.delete()?;
            self.publish(AuthState::SignedOut);
            return Err(AuthError::TokenRefreshFailed(status.as_u16()));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("Bad refresh response: {}", e)))?;

        // Keep the old refresh token unless the server rotated it
        let credential = credential_from_response(token, Some(current.refresh_token))?;
        self.store.save(&credential)?;
        Ok(credential.access_token)
    }

    fn publish(&self, state: AuthState) {
        self.auth_state.send_replace(state);
    }
}

fn credential_from_response(
    token: TokenResponse,
    previous_refresh: Option<String>,
) -> Result<Credential, AuthError> {
    let refresh_token = token
        .refresh_token
        .or(previous_refresh)
        .ok_or_else(|| AuthError::InvalidResponse("no refresh token granted".to_string()))?;
    let expires_in = token.expires_in.unwrap_or(3600);

    Ok(Credential {
        access_token: token.access_token,
        refresh_token,
        expires_at: Utc::now() + chrono::Duration::seconds(expires_in as i64),
    })
}

fn parse_authorization_callback(url: &Url) -> Result<(String, Option<String>), AuthError> {
    let mut code = None;
    let mut state = None;
    let mut error = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        if error == "access_denied" {
            return Err(AuthError::Cancelled);
        }
        return Err(AuthError::InvalidResponse(format!(
            "authorization error: {}",
            error
        )));
    }

    let code = code.ok_or_else(|| {
        AuthError::InvalidResponse("no authorization code in callback".to_string())
    })?;
    Ok((code, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostError;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct MemoryStore {
        inner: StdMutex<MemoryInner>,
    }

    #[derive(Default)]
    struct MemoryInner {
        credential: Option<Credential>,
        generation: i64,
    }

    impl MemoryStore {
        fn with_credential(credential: Credential, generation: i64) -> Self {
            Self {
                inner: StdMutex::new(MemoryInner {
                    credential: Some(credential),
                    generation,
                }),
            }
        }
    }

    impl CredentialStore for MemoryStore {
        fn save(&self, credential: &Credential) -> Result<(), StoreError> {
            self.inner.lock().unwrap().credential = Some(credential.clone());
            Ok(())
        }

        fn load(&self) -> Result<Option<Credential>, StoreError> {
            Ok(self.inner.lock().unwrap().credential.clone())
        }

        fn delete(&self) -> Result<(), StoreError> {
            self.inner.lock().unwrap().credential = None;
            Ok(())
        }

        fn scope_generation(&self) -> Result<i64, StoreError> {
            Ok(self.inner.lock().unwrap().generation)
        }

        fn migrate_scope_generation(&self, generation: i64) -> Result<(), StoreError> {
            let mut inner = self.inner.lock().unwrap();
            inner.credential = None;
            inner.generation = generation;
            Ok(())
        }
    }

    /// Host that answers with a fixed outcome, or echoes the state parameter
    /// of the presented URL into a synthetic callback
    enum FakeHost {
        Fixed(&'static str),
        Dismiss,
        EchoState,
    }

    impl InteractionHost for FakeHost {
        async fn present_url(
            &self,
            url: Url,
            callback_prefix: &str,
        ) -> Result<HostOutcome, HostError> {
            match self {
                FakeHost::Fixed(query) => Ok(HostOutcome::Callback(
                    Url::parse(&format!("{}?{}", callback_prefix, query)).unwrap(),
                )),
                FakeHost::Dismiss => Ok(HostOutcome::Dismissed),
                FakeHost::EchoState => {
                    let state = url
                        .query_pairs()
                        .find(|(k, _)| k == "state")
                        .map(|(_, v)| v.into_owned())
                        .unwrap();
                    Ok(HostOutcome::Callback(
                        Url::parse(&format!("{}?code=abc&state={}", callback_prefix, state))
                            .unwrap(),
                    ))
                }
            }
        }
    }

    fn test_config() -> OAuthConfig {
        OAuthConfig {
            client_id: "test-client".to_string(),
            // Nothing listens here, so network paths fail fast
            auth_endpoint: "http://127.0.0.1:9/auth".to_string(),
            token_endpoint: "http://127.0.0.1:9/token".to_string(),
            revoke_endpoint: "http://127.0.0.1:9/revoke".to_string(),
            redirect_uri: "wallshift://oauth/callback".to_string(),
            ..OAuthConfig::default()
        }
    }

    fn live_credential() -> Credential {
        Credential {
            access_token: "live-token".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    fn expired_credential() -> Credential {
        Credential {
            access_token: "dead-token".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() - chrono::Duration::hours(1),
        }
    }

    #[test]
    fn test_empty_client_id_is_config_missing() {
        let config = OAuthConfig::default();
        assert!(matches!(
            TokenAuthority::new(config, MemoryStore::default()).err(),
            Some(AuthError::ConfigMissing)
        ));
    }

    #[test]
    fn test_initialize_without_credential_is_signed_out() {
        let authority = TokenAuthority::new(test_config(), MemoryStore::default()).unwrap();
        assert_eq!(authority.current_state(), AuthState::Unknown);
        assert_eq!(authority.initialize().unwrap(), AuthState::SignedOut);
        assert_eq!(authority.current_state(), AuthState::SignedOut);
    }

    #[test]
    fn test_initialize_with_current_generation_is_signed_in() {
        let store = MemoryStore::with_credential(live_credential(), SCOPE_GENERATION);
        let authority = TokenAuthority::new(test_config(), store).unwrap();
        assert_eq!(authority.initialize().unwrap(), AuthState::SignedIn);
    }

    #[test]
    fn test_scope_migration_discards_stale_credential() {
        let store = MemoryStore::with_credential(live_credential(), SCOPE_GENERATION - 1);
        let authority = TokenAuthority::new(test_config(), store).unwrap();

        assert_eq!(authority.initialize().unwrap(), AuthState::SignedOut);
        assert!(authority.store.load().unwrap().is_none());
        assert_eq!(
            authority.store.scope_generation().unwrap(),
            SCOPE_GENERATION
        );

        // Second launch must not discard anything again
        let fresh = live_credential();
        authority.store.save(&fresh).unwrap();
        assert_eq!(authority.initialize().unwrap(), AuthState::SignedIn);
        assert!(authority.store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sign_in_dismissed_is_cancelled() {
        let authority = TokenAuthority::new(test_config(), MemoryStore::default()).unwrap();
        let result = authority.sign_in(&FakeHost::Dismiss).await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[tokio::test]
    async fn test_sign_in_rejects_forged_state() {
        let authority = TokenAuthority::new(test_config(), MemoryStore::default()).unwrap();
        let result = authority
            .sign_in(&FakeHost::Fixed("code=abc&state=forged"))
            .await;
        assert!(matches!(result, Err(AuthError::StateMismatch)));
    }

    #[tokio::test]
    async fn test_sign_in_requires_code() {
        let authority = TokenAuthority::new(test_config(), MemoryStore::default()).unwrap();
        let result = authority.sign_in(&FakeHost::Fixed("state=whatever")).await;
        assert!(matches!(result, Err(AuthError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_sign_in_access_denied_is_cancelled() {
        let authority = TokenAuthority::new(test_config(), MemoryStore::default()).unwrap();
        let result = authority
            .sign_in(&FakeHost::Fixed("error=access_denied"))
            .await;
        assert!(matches!(result, Err(AuthError::Cancelled)));
    }

    #[tokio::test]
    async fn test_matching_state_reaches_the_exchange() {
        // The echoed state passes validation, so the flow proceeds to the
        // (unreachable) token endpoint instead of failing the state check.
        let authority = TokenAuthority::new(test_config(), MemoryStore::default()).unwrap();
        let result = authority.sign_in(&FakeHost::EchoState).await;
        assert!(matches!(result, Err(AuthError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_refresh_skips_network_when_not_expired() {
        let store = MemoryStore::with_credential(live_credential(), SCOPE_GENERATION);
        let authority = TokenAuthority::new(test_config(), store).unwrap();
        let token = authority.refresh_token_if_needed().await.unwrap();
        assert_eq!(token, "live-token");
    }

    #[tokio::test]
    async fn test_refresh_without_credential_fails() {
        let authority = TokenAuthority::new(test_config(), MemoryStore::default()).unwrap();
        let result = authority.refresh_token_if_needed().await;
        assert!(matches!(result, Err(AuthError::NoStoredCredential)));
    }

    #[tokio::test]
    async fn test_refresh_transport_error_keeps_credential() {
        // Only an HTTP error status invalidates the session; an unreachable
        // endpoint must leave the stored credential untouched.
        let store = MemoryStore::with_credential(expired_credential(), SCOPE_GENERATION);
        let authority = TokenAuthority::new(test_config(), store).unwrap();

        let result = authority.refresh_token_if_needed().await;
        assert!(matches!(result, Err(AuthError::NetworkError(_))));
        assert!(authority.store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sign_out_is_idempotent_and_survives_revocation_failure() {
        let store = MemoryStore::with_credential(live_credential(), SCOPE_GENERATION);
        let authority = TokenAuthority::new(test_config(), store).unwrap();

        // Revocation endpoint is unreachable; sign-out must still succeed
        authority.sign_out().await.unwrap();
        assert!(authority.store.load().unwrap().is_none());
        assert_eq!(authority.current_state(), AuthState::SignedOut);

        // Signing out of an already-empty store is not an error
        authority.sign_out().await.unwrap();
        assert!(authority.store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_auth_state_transitions_are_observable() {
        let store = MemoryStore::with_credential(live_credential(), SCOPE_GENERATION);
        let authority = TokenAuthority::new(test_config(), store).unwrap();
        let receiver = authority.subscribe();

        assert_eq!(*receiver.borrow(), AuthState::Unknown);
        authority.initialize().unwrap();
        assert_eq!(*receiver.borrow(), AuthState::SignedIn);
        authority.sign_out().await.unwrap();
        assert_eq!(*receiver.borrow(), AuthState::SignedOut);
    }

    #[test]
    fn test_callback_parsing() {
        let url = Url::parse("wallshift://oauth/callback?code=c1&state=s1").unwrap();
        let (code, state) = parse_authorization_callback(&url).unwrap();
        assert_eq!(code, "c1");
        assert_eq!(state.as_deref(), Some("s1"));

        let url = Url::parse("wallshift://oauth/callback?error=server_error").unwrap();
        assert!(matches!(
            parse_authorization_callback(&url),
            Err(AuthError::InvalidResponse(_))
        ));
    }
}
