pub mod schema;

use std::path::Path;

use rusqlite::Connection;

use crate::error::AppError;

/// Opens (creating if necessary) the application database and ensures the
/// schema is current
pub fn open_database(path: &Path) -> Result<Connection, AppError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(path)?;
    schema::init_schema(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub(crate) fn open_test_database() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    schema::init_schema(&conn).unwrap();
    conn
}
