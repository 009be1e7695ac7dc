use std::fmt;

use photos_auth::{AuthError, StoreError};
use photos_picker::{CacheError, DownloadError, PickerError};

use crate::services::rotation_engine::RotationError;

/// Central error types for the wallshift app
#[derive(Debug)]
pub enum AppError {
    /// Credential lifecycle error (sign-in, refresh, sign-out)
    Auth(AuthError),
    /// Picker session or media-item error
    Picker(PickerError),
    /// Image download error
    Download(DownloadError),
    /// Local blob cache error
    Cache(CacheError),
    /// Rotation engine error
    Rotation(RotationError),
    /// Database error (rusqlite)
    Database(rusqlite::Error),
    /// Filesystem error
    Io(std::io::Error),
    /// Configuration missing or invalid
    Config(String),
    /// General error
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Auth(e) => write!(f, "Authentication error: {}", e),
            AppError::Picker(e) => write!(f, "Picker error: {}", e),
            AppError::Download(e) => write!(f, "Download error: {}", e),
            AppError::Cache(e) => write!(f, "Cache error: {}", e),
            AppError::Rotation(e) => write!(f, "Rotation error: {}", e),
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Io(e) => write!(f, "Filesystem error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// Conversions from component error types
impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Auth(e)
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Auth(AuthError::Store(e))
    }
}

impl From<PickerError> for AppError {
    fn from(e: PickerError) -> Self {
        AppError::Picker(e)
    }
}

impl From<DownloadError> for AppError {
    fn from(e: DownloadError) -> Self {
        AppError::Download(e)
    }
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        AppError::Cache(e)
    }
}

impl From<RotationError> for AppError {
    fn from(e: RotationError) -> Self {
        AppError::Rotation(e)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Other(format!("Serialization error: {}", e))
    }
}

/// User-friendly error messages for actionable surfaces
impl AppError {
    pub fn user_message(&self) -> String {
        match self {
            AppError::Auth(AuthError::Cancelled) => "Sign-in was cancelled.".to_string(),
            AppError::Auth(_) => "Sign-in failed. Please try again.".to_string(),
            AppError::Picker(PickerError::UserCancelled) => {
                "Photo selection was cancelled.".to_string()
            }
            AppError::Picker(PickerError::SelectionTimedOut) => {
                "Photo selection timed out. Please try again.".to_string()
            }
            AppError::Picker(_) => "Photo selection failed. Please try again.".to_string(),
            AppError::Download(_) => "Downloading a photo failed.".to_string(),
            AppError::Cache(_) => "Error accessing the local image cache.".to_string(),
            AppError::Rotation(_) => "Wallpaper rotation is unavailable.".to_string(),
            AppError::Database(_) => "A database error occurred. Please try again.".to_string(),
            AppError::Io(_) => "Error accessing files. Please check permissions.".to_string(),
            AppError::Config(msg) => msg.clone(),
            AppError::Other(msg) => msg.clone(),
        }
    }
}
