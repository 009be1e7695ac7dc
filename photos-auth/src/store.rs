use crate::models::Credential;

/// Error type for credential-store operations
#[derive(Debug)]
pub enum StoreError {
    Unavailable(String),
    ReadFailed(String),
    WriteFailed(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "Credential store unavailable: {}", msg),
            StoreError::ReadFailed(msg) => write!(f, "Credential read failed: {}", msg),
            StoreError::WriteFailed(msg) => write!(f, "Credential write failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Opaque secure store for the single OAuth credential
///
/// The token authority is the only writer; everything else receives bearer
/// tokens per call and never touches the store.
pub trait CredentialStore: Send + Sync {
    fn save(&self, credential: &Credential) -> Result<(), StoreError>;

    /// Returns `Ok(None)` when no credential has been persisted
    fn load(&self) -> Result<Option<Credential>, StoreError>;

    /// Idempotent: deleting an absent credential succeeds
    fn delete(&self) -> Result<(), StoreError>;

    /// Permission-scope generation the stored credential was granted under
    fn scope_generation(&self) -> Result<i64, StoreError>;

    /// Discard any stored credential and record `generation`, as one atomic
    /// step so a crash cannot leave the flag updated with a stale credential
    fn migrate_scope_generation(&self, generation: i64) -> Result<(), StoreError>;
}
