//! Persistence for the last successful picker result
//!
//! The cache is replaced wholesale on every completed selection and lets
//! rotation start without re-invoking the external picker. Staleness is
//! advisory only; a stale cache is still usable.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use photos_picker::{Photo, PhotoMetadata};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppError;

/// Age after which a cached selection is surfaced as stale
pub const STALENESS_THRESHOLD_DAYS: i64 = 7;

/// The cached selection plus the time it was made
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSelection {
    pub photos: Vec<Photo>,
    pub selected_at: DateTime<Utc>,
}

/// Overwrites the cached selection and stamps `selected_at = now`.
/// Duplicate ids are dropped, keeping the first occurrence.
pub fn replace_selection(conn: &mut Connection, photos: &[Photo]) -> Result<(), AppError> {
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM selected_photos", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO selected_photos
             (position, photo_id, base_url, filename, mime_type, width, height, creation_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;

        let mut seen = HashSet::new();
        let mut position = 0i64;
        for photo in photos {
            if !seen.insert(photo.id.as_str()) {
                continue;
            }
            stmt.execute(params![
                position,
                photo.id,
                photo.base_url,
                photo.filename,
                photo.mime_type,
                photo.metadata.as_ref().and_then(|m| m.width),
                photo.metadata.as_ref().and_then(|m| m.height),
                photo
                    .metadata
                    .as_ref()
                    .and_then(|m| m.creation_time)
                    .map(|t| t.to_rfc3339()),
            ])?;
            position += 1;
        }
    }

    tx.execute(
        "INSERT OR REPLACE INTO selection_meta (id, selected_at) VALUES (1, ?1)",
        params![Utc::now().to_rfc3339()],
    )?;

    tx.commit()?;
    log::info!("Selection cache replaced");
    Ok(())
}

/// Loads the cached selection in selection order
pub fn load_selection(conn: &Connection) -> Result<Option<CachedSelection>, AppError> {
    let selected_at = conn
        .query_row(
            "SELECT selected_at FROM selection_meta WHERE id = 1",
            [],
            |row| row.get::<_, String>(0),
        )
        .optional()?;

    let selected_at = match selected_at {
        None => return Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| AppError::Other(format!("Bad selection timestamp: {}", e)))?
            .with_timezone(&Utc),
    };

    let mut stmt = conn.prepare(
        "SELECT photo_id, base_url, filename, mime_type, width, height, creation_time
         FROM selected_photos
         ORDER BY position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<u32>>(4)?,
            row.get::<_, Option<u32>>(5)?,
            row.get::<_, Option<String>>(6)?,
        ))
    })?;

    let mut photos = Vec::new();
    for row in rows {
        let (id, base_url, filename, mime_type, width, height, creation_time) = row?;

        let creation_time = match creation_time {
            None => None,
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| AppError::Other(format!("Bad creation timestamp: {}", e)))?
                    .with_timezone(&Utc),
            ),
        };
        let metadata = if width.is_none() && height.is_none() && creation_time.is_none() {
            None
        } else {
            Some(PhotoMetadata {
                width,
                height,
                creation_time,
            })
        };

        photos.push(Photo {
            id,
            base_url,
            filename,
            mime_type,
            metadata,
        });
    }

    Ok(Some(CachedSelection {
        photos,
        selected_at,
    }))
}

/// Empties the cache (explicit user action)
pub fn clear_selection(conn: &Connection) -> Result<(), AppError> {
    conn.execute("DELETE FROM selected_photos", [])?;
    conn.execute("DELETE FROM selection_meta", [])?;
    log::info!("Selection cache cleared");
    Ok(())
}

/// Pure staleness check against the 7-day threshold
pub fn selection_is_stale(selected_at: DateTime<Utc>) -> bool {
    Utc::now() - selected_at > chrono::Duration::days(STALENESS_THRESHOLD_DAYS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database;

    fn photo(id: &str) -> Photo {
        Photo {
            id: id.to_string(),
            base_url: format!("https://media.example.com/{}", id),
            filename: format!("{}.jpg", id),
            mime_type: "image/jpeg".to_string(),
            metadata: None,
        }
    }

    fn photo_with_metadata(id: &str) -> Photo {
        Photo {
            metadata: Some(PhotoMetadata {
                width: Some(4032),
                height: Some(3024),
                creation_time: Some("2024-05-01T10:30:00Z".parse().unwrap()),
            }),
            ..photo(id)
        }
    }

    #[test]
    fn test_replace_and_load_preserves_order_and_metadata() {
        let mut conn = database::open_test_database();
        let photos = vec![photo_with_metadata("b"), photo("a"), photo("c")];

        replace_selection(&mut conn, &photos).unwrap();
        let cached = load_selection(&conn).unwrap().unwrap();

        assert_eq!(cached.photos, photos);
        let metadata = cached.photos[0].metadata.as_ref().unwrap();
        assert_eq!(metadata.width, Some(4032));
        assert!(!selection_is_stale(cached.selected_at));
    }

    #[test]
    fn test_replace_deduplicates_by_id() {
        let mut conn = database::open_test_database();
        replace_selection(&mut conn, &[photo("a"), photo("a"), photo("b")]).unwrap();

        let cached = load_selection(&conn).unwrap().unwrap();
        assert_eq!(cached.photos.len(), 2);
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut conn = database::open_test_database();
        replace_selection(&mut conn, &[photo("old1"), photo("old2")]).unwrap();
        replace_selection(&mut conn, &[photo("new")]).unwrap();

        let cached = load_selection(&conn).unwrap().unwrap();
        let ids: Vec<&str> = cached.photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["new"]);
    }

    #[test]
    fn test_empty_cache_loads_as_none() {
        let conn = database::open_test_database();
        assert!(load_selection(&conn).unwrap().is_none());
    }

    #[test]
    fn test_clear_empties_the_cache() {
        let mut conn = database::open_test_database();
        replace_selection(&mut conn, &[photo("a")]).unwrap();

        clear_selection(&conn).unwrap();
        assert!(load_selection(&conn).unwrap().is_none());
    }

    #[test]
    fn test_staleness_threshold() {
        assert!(!selection_is_stale(Utc::now() - chrono::Duration::days(6)));
        assert!(selection_is_stale(Utc::now() - chrono::Duration::days(8)));
    }
}
