use std::time::Duration;

use serde::{Deserialize, Serialize};

/// User-facing rotation settings, persisted as a single row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Seconds between wallpaper advances
    pub rotation_interval_secs: u32,
    /// Whether rotation should come up paused
    pub paused: bool,
    /// Ids the user has ticked in the selection screen
    pub selected_photo_ids: Vec<String>,
}

impl Settings {
    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.rotation_interval_secs))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rotation_interval_secs: 1800,
            paused: false,
            selected_photo_ids: Vec::new(),
        }
    }
}
