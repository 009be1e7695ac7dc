use rusqlite::{Connection, Result};

/// Initialize the complete database schema for the wallshift app
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Schema version table for future migrations
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        create_schema(conn)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Create the complete schema (version 1)
fn create_schema(conn: &Connection) -> Result<()> {
    // Table: credential (single row, owned by the token authority)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS credential (
            id INTEGER PRIMARY KEY CHECK(id = 1),
            access_token TEXT NOT NULL,
            refresh_token TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Table: auth_meta (bookkeeping such as the permission-scope generation)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS auth_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    // Table: settings (single row)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK(id = 1),
            rotation_interval_secs INTEGER NOT NULL,
            paused INTEGER NOT NULL DEFAULT 0,
            selected_photo_ids TEXT NOT NULL DEFAULT '[]',
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Table: selected_photos (last successful picker result, selection order)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS selected_photos (
            position INTEGER PRIMARY KEY,
            photo_id TEXT NOT NULL UNIQUE,
            base_url TEXT NOT NULL,
            filename TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            width INTEGER,
            height INTEGER,
            creation_time TEXT
        )",
        [],
    )?;

    // Table: selection_meta (timestamp of the last successful selection)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS selection_meta (
            id INTEGER PRIMARY KEY CHECK(id = 1),
            selected_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}
