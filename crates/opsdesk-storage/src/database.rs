// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread: the [`Database`] struct IS the single writer. Query modules accept
//! `&Database` and go through `connection().call()`, so concurrent callers
//! queue on the writer rather than failing fast, and SQLITE_BUSY never
//! surfaces between opsdesk's own operations.

use std::time::Duration;

use opsdesk_core::StoreError;
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use crate::migrations;

/// Attempts made to open the database before giving up.
const OPEN_ATTEMPTS: u32 = 3;

/// Fixed delay between open attempts.
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Handle to the SQLite database: one connection, one background writer.
///
/// Constructed once at startup and shared by reference; there is no ambient
/// global and no pool to exhaust.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies PRAGMAs,
    /// and runs any pending migrations.
    ///
    /// Opening retries a few times with a fixed delay before surfacing
    /// [`StoreError::Connection`], so a desk starting before its volume is
    /// mounted settles instead of crashing.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, StoreError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::Connection {
                    source: Box::new(e),
                })?;
            }
        }

        let mut attempt = 1;
        let conn = loop {
            match Connection::open(path).await {
                Ok(conn) => break conn,
                Err(e) if attempt < OPEN_ATTEMPTS => {
                    warn!(
                        attempt,
                        error = %e,
                        "database open failed, retrying"
                    );
                    tokio::time::sleep(OPEN_RETRY_DELAY).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(StoreError::Connection {
                        source: Box::new(e),
                    });
                }
            }
        };

        conn.call(move |conn| {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
            }
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            migrations::run_migrations(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// Returns the underlying connection for query modules.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoints the WAL so all committed data lands in the main file.
    pub async fn checkpoint(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Checkpoints and closes the connection, ending the writer thread.
    pub async fn close(self) -> Result<(), StoreError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(|e| StoreError::Connection {
            source: Box::new(e),
        })
    }
}

/// Maps a tokio-rusqlite error onto the store error taxonomy.
///
/// Constraint violations become [`StoreError::Constraint`]; everything else
/// (closed writer, I/O, corruption) is a connection-level failure.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> StoreError {
    match e {
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(err, msg))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Constraint(msg.unwrap_or_else(|| err.to_string()))
        }
        other => StoreError::Connection {
            source: Box::new(other),
        },
    }
}

/// True when the error is a rejected foreign key, which at the ticket-update
/// boundary means the referenced ticket does not exist.
pub(crate) fn is_foreign_key_violation(e: &tokio_rusqlite::Error) -> bool {
    matches!(
        e,
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_database_and_parent_dir() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/desk.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn migrations_create_both_tables() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("schema.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();

        let count: i64 = db
            .connection()
            .call(|conn| {
                let n = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master
                     WHERE type = 'table' AND name IN ('tickets', 'ticket_updates')",
                    [],
                    |row| row.get(0),
                )?;
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(count, 2);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_is_idempotent_across_restarts() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("reopen.db");

        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        db.close().await.unwrap();

        // Second open re-runs the migration runner against applied history.
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("fk.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();

        let result = db
            .connection()
            .call(|conn| {
                conn.execute(
                    "INSERT INTO ticket_updates (ticket_id, username, update_text)
                     VALUES (999, 'alice', 'orphan')",
                    [],
                )?;
                Ok(())
            })
            .await;

        assert!(result.is_err(), "orphan update should be rejected");
        assert!(is_foreign_key_violation(&result.unwrap_err()));

        db.close().await.unwrap();
    }
}
