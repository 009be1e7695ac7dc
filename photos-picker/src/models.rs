use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed-size crop suffix appended to a base URL for thumbnails.
/// This is a documented convention of the remote image host.
const THUMBNAIL_SUFFIX: &str = "=w256-h256-c";

/// Suffix appended to a base URL for the unscaled original bytes
const FULL_RESOLUTION_SUFFIX: &str = "=d";

/// A photo selected through the picker
///
/// Immutable value object; equality and hashing go by the remote media id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub base_url: String,
    pub filename: String,
    pub mime_type: String,
    pub metadata: Option<PhotoMetadata>,
}

impl Photo {
    pub fn thumbnail_url(&self) -> String {
        format!("{}{}", self.base_url, THUMBNAIL_SUFFIX)
    }

    pub fn full_resolution_url(&self) -> String {
        format!("{}{}", self.base_url, FULL_RESOLUTION_SUFFIX)
    }
}

impl PartialEq for Photo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Photo {}

impl Hash for Photo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Optional dimensions and capture time reported by the remote host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub creation_time: Option<DateTime<Utc>>,
}

/// Size variants for photo retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoQuality {
    /// Fixed-size crop for lists; never cached
    Thumbnail,
    /// Original bytes; cached by photo id
    FullResolution,
}

/// A remote picker session
///
/// Ephemeral: lives only for the duration of one selection flow and is never
/// persisted. The picker URI is present only in the creation response.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerSession {
    pub id: String,
    pub picker_uri: Option<String>,
    pub media_ready: bool,
}

// --- wire types -------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_item_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionResponse {
    pub id: String,
    #[serde(default)]
    pub picker_uri: Option<String>,
    #[serde(default)]
    pub media_items_set: Option<bool>,
}

impl SessionResponse {
    pub(crate) fn into_session(self) -> PickerSession {
        PickerSession {
            id: self.id,
            picker_uri: self.picker_uri,
            media_ready: self.media_items_set.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MediaItemsResponse {
    #[serde(default)]
    pub media_items: Vec<MediaItemResponse>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MediaItemResponse {
    pub id: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub media_metadata: Option<MediaMetadataResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MediaMetadataResponse {
    // Dimensions arrive as decimal strings
    #[serde(default)]
    pub width: Option<String>,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub creation_time: Option<DateTime<Utc>>,
}

impl MediaItemResponse {
    /// Convert a remote item to the domain model.
    ///
    /// An item without a usable base URL cannot be rendered at all and is
    /// dropped by returning `None`; partial conversion failures are expected
    /// and non-fatal.
    pub(crate) fn into_photo(self) -> Option<Photo> {
        let base_url = match self.base_url {
            Some(url) if !url.trim().is_empty() => url,
            _ => return None,
        };

        let metadata = self.media_metadata.map(|m| PhotoMetadata {
            width: m.width.and_then(|w| w.parse().ok()),
            height: m.height.and_then(|h| h.parse().ok()),
            creation_time: m.creation_time,
        });

        Some(Photo {
            filename: self.filename.unwrap_or_else(|| self.id.clone()),
            mime_type: self.mime_type.unwrap_or_else(|| "image/jpeg".to_string()),
            id: self.id,
            base_url,
            metadata,
        })
    }
}
