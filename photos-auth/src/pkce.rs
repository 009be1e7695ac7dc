//! PKCE verifier/challenge material (RFC 7636)

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Challenge method sent to the authorization endpoint
pub const CHALLENGE_METHOD: &str = "S256";

/// One-shot secrets for a single authorization flow
///
/// The verifier and state must not outlive the flow they were generated for.
#[derive(Debug, Clone)]
pub struct PkceMaterial {
    /// High-entropy secret kept local until the code exchange
    pub verifier: String,
    /// base64url(SHA-256(verifier)), no padding
    pub challenge: String,
    /// Anti-forgery value echoed back by the authorization server
    pub state: String,
}

impl PkceMaterial {
    /// Generate fresh material for one sign-in flow
    pub fn generate() -> Self {
        let bytes: [u8; 32] = rand::rng().random();
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = challenge_for(&verifier);
        let state = uuid::Uuid::new_v4().simple().to_string();
        Self {
            verifier,
            challenge,
            state,
        }
    }
}

fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
