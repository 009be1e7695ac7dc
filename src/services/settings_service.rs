use rusqlite::{params, Connection, OptionalExtension};

use crate::error::AppError;
use crate::models::Settings;

/// Loads the persisted settings row
pub fn load_settings(conn: &Connection) -> Result<Option<Settings>, AppError> {
    let row = conn
        .query_row(
            "SELECT rotation_interval_secs, paused, selected_photo_ids
             FROM settings
             WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    match row {
        None => Ok(None),
        Some((rotation_interval_secs, paused, ids_json)) => {
            let selected_photo_ids = serde_json::from_str(&ids_json)?;
            Ok(Some(Settings {
                rotation_interval_secs,
                paused,
                selected_photo_ids,
            }))
        }
    }
}

/// Returns the persisted settings, or defaults when none were saved yet
pub fn load_settings_or_default(conn: &Connection) -> Result<Settings, AppError> {
    Ok(load_settings(conn)?.unwrap_or_default())
}

/// Saves (or replaces) the single settings row
pub fn save_settings(conn: &Connection, settings: &Settings) -> Result<(), AppError> {
    let ids_json = serde_json::to_string(&settings.selected_photo_ids)?;
    conn.execute(
        "INSERT OR REPLACE INTO settings (id, rotation_interval_secs, paused, selected_photo_ids)
         VALUES (1, ?1, ?2, ?3)",
        params![settings.rotation_interval_secs, settings.paused, ids_json],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::init_schema;

    #[test]
    fn test_round_trip_through_a_fresh_connection() {
        let dir = std::env::temp_dir().join(format!("wallshift-settings-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let db_path = dir.join("settings.db");

        let settings = Settings {
            rotation_interval_secs: 600,
            paused: true,
            selected_photo_ids: vec!["p1".to_string(), "p2".to_string()],
        };

        {
            let conn = Connection::open(&db_path).unwrap();
            init_schema(&conn).unwrap();
            save_settings(&conn, &settings).unwrap();
        }

        // A fresh manager instance over the same backing store
        let conn = Connection::open(&db_path).unwrap();
        init_schema(&conn).unwrap();
        let loaded = load_settings(&conn).unwrap().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_row_yields_defaults() {
        let conn = crate::database::open_test_database();
        assert!(load_settings(&conn).unwrap().is_none());
        assert_eq!(load_settings_or_default(&conn).unwrap(), Settings::default());
    }

    #[test]
    fn test_save_overwrites_previous_row() {
        let conn = crate::database::open_test_database();
        save_settings(&conn, &Settings::default()).unwrap();

        let updated = Settings {
            rotation_interval_secs: 60,
            paused: false,
            selected_photo_ids: vec!["only".to_string()],
        };
        save_settings(&conn, &updated).unwrap();

        assert_eq!(load_settings(&conn).unwrap().unwrap(), updated);
    }

}
