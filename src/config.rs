use std::path::{Path, PathBuf};

use photos_auth::OAuthConfig;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV_VAR: &str = "WALLSHIFT_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "wallshift.toml";

/// Application configuration loaded from a TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub picker: PickerApiConfig,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickerApiConfig {
    #[serde(default = "default_picker_base_url")]
    pub base_url: String,
    /// Optional cap on how many items the user may pick per session
    #[serde(default)]
    pub max_item_count: Option<u32>,
}

impl Default for PickerApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_picker_base_url(),
            max_item_count: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("wallshift.db")
    }

    pub fn image_cache_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join("image-cache")
    }
}

fn default_picker_base_url() -> String {
    "https://photospicker.googleapis.com/v1".to_string()
}

fn default_interval_secs() -> u32 {
    1800
}

fn default_data_dir() -> String {
    "./data".to_string()
}

/// Configuration file location: env override, then the working directory
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!(
            "Cannot read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;
    let config: AppConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("Invalid configuration: {}", e)))?;
    Ok(config)
}
