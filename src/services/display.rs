//! Wallpaper application to the connected displays
//!
//! The OS-level "set this image as the background everywhere" operation is
//! behind a small trait so the rotation engine stays platform-agnostic.

use std::path::Path;

/// Error type for wallpaper application
#[derive(Debug)]
pub enum ApplyError {
    NoDisplaysAvailable,
    Failed(String),
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyError::NoDisplaysAvailable => write!(f, "No displays available"),
            ApplyError::Failed(msg) => write!(f, "Wallpaper apply failed: {}", msg),
        }
    }
}

impl std::error::Error for ApplyError {}

/// Applies a local image file as the desktop background on every currently
/// connected display. Per-display failures surface as one aggregate error.
pub trait WallpaperTarget: Send + Sync + 'static {
    fn apply(&self, image: &Path) -> Result<(), ApplyError>;
}

/// GNOME wallpaper target driven through `gsettings`
pub struct GsettingsWallpaper;

impl WallpaperTarget for GsettingsWallpaper {
    fn apply(&self, image: &Path) -> Result<(), ApplyError> {
        if std::env::var_os("DISPLAY").is_none() && std::env::var_os("WAYLAND_DISPLAY").is_none() {
            return Err(ApplyError::NoDisplaysAvailable);
        }

        let uri = format!("file://{}", image.display());
        // GNOME reads a different key per color scheme; set both so the
        // wallpaper changes regardless of the active scheme.
        for key in ["picture-uri", "picture-uri-dark"] {
            let status = std::process::Command::new("gsettings")
                .args(["set", "org.gnome.desktop.background", key, &uri])
                .status()
                .map_err(|e| ApplyError::Failed(format!("gsettings not runnable: {}", e)))?;
            if !status.success() {
                return Err(ApplyError::Failed(format!(
                    "gsettings {} exited with {}",
                    key, status
                )));
            }
        }

        log::debug!("Applied wallpaper {}", image.display());
        Ok(())
    }
}
