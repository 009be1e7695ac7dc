use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use photos_auth::{Credential, CredentialStore, StoreError};
use rusqlite::{params, Connection, OptionalExtension};

const SCOPE_GENERATION_KEY: &str = "scope_generation";

/// SQLite-backed implementation of the secure credential store
///
/// Shares the application connection; the token authority is the only
/// writer, everyone else only ever receives bearer tokens per call.
pub struct SqliteCredentialStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCredentialStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".to_string()))
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO credential (id, access_token, refresh_token, expires_at)
             VALUES (1, ?1, ?2, ?3)",
            params![
                credential.access_token,
                credential.refresh_token,
                credential.expires_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn load(&self) -> Result<Option<Credential>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT access_token, refresh_token, expires_at FROM credential WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        match row {
            None => Ok(None),
            Some((access_token, refresh_token, expires_at)) => {
                let expires_at = DateTime::parse_from_rfc3339(&expires_at)
                    .map_err(|e| StoreError::ReadFailed(format!("bad expiry timestamp: {}", e)))?
                    .with_timezone(&Utc);
                Ok(Some(Credential {
                    access_token,
                    refresh_token,
                    expires_at,
                }))
            }
        }
    }

    fn delete(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        // Idempotent: deleting an absent credential succeeds
        conn.execute("DELETE FROM credential", [])
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    fn scope_generation(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM auth_meta WHERE key = ?1",
                params![SCOPE_GENERATION_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| StoreError::ReadFailed(e.to_string()))?;

        match value {
            None => Ok(0),
            Some(raw) => raw
                .parse()
                .map_err(|e| StoreError::ReadFailed(format!("bad scope generation: {}", e))),
        }
    }

    fn migrate_scope_generation(&self, generation: i64) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        // Credential removal and flag update happen in one transaction so a
        // crash cannot leave the flag set while a stale credential survives.
        let tx = conn
            .transaction()
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        tx.execute("DELETE FROM credential", [])
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        tx.execute(
            "INSERT OR REPLACE INTO auth_meta (key, value) VALUES (?1, ?2)",
            params![SCOPE_GENERATION_KEY, generation.to_string()],
        )
        .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        tx.commit()
            .map_err(|e| StoreError::WriteFailed(e.to_string()))?;
        Ok(())
    }
}
