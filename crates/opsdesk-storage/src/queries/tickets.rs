// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket CRUD operations.

use std::str::FromStr;

use opsdesk_core::{StoreError, Ticket, TicketStatus, TicketSummary};
use rusqlite::params;

use crate::database::Database;

/// Create a ticket and return its id.
///
/// Ids come from AUTOINCREMENT, so they are strictly increasing across the
/// lifetime of the database.
pub async fn create_ticket(
    db: &Database,
    description: &str,
    photo_file_id: Option<&str>,
) -> Result<i64, StoreError> {
    if description.trim().is_empty() {
        return Err(StoreError::Constraint(
            "ticket description must not be empty".into(),
        ));
    }

    let description = description.to_string();
    let photo_file_id = photo_file_id.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tickets (description, photo_file_id) VALUES (?1, ?2)",
                params![description, photo_file_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List open tickets, newest first.
pub async fn list_open_tickets(db: &Database) -> Result<Vec<TicketSummary>, StoreError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, description, photo_file_id
                 FROM tickets
                 WHERE status = 'open'
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(TicketSummary {
                    id: row.get(0)?,
                    description: row.get(1)?,
                    photo_file_id: row.get(2)?,
                })
            })?;

            let mut tickets = Vec::new();
            for row in rows {
                tickets.push(row?);
            }
            Ok(tickets)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get a ticket by id, or `None` when it does not exist.
pub async fn get_ticket(db: &Database, id: i64) -> Result<Option<Ticket>, StoreError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, description, photo_file_id, status, created_at
                 FROM tickets WHERE id = ?1",
            )?;
            let result = stmt.query_row(params![id], |row| {
                let status: String = row.get(3)?;
                let status = TicketStatus::from_str(&status).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(Ticket {
                    id: row.get(0)?,
                    description: row.get(1)?,
                    photo_file_id: row.get(2)?,
                    status,
                    created_at: row.get(4)?,
                })
            });
            match result {
                Ok(ticket) => Ok(Some(ticket)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark a ticket resolved. Returns whether a row actually changed.
///
/// The status guard in the WHERE clause makes this idempotent: an
/// already-resolved or missing ticket changes no rows and is reported as
/// `false`, never an error, and a resolution is never reverted.
pub async fn resolve_ticket(db: &Database, id: i64) -> Result<bool, StoreError> {
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE tickets SET status = 'resolved'
                 WHERE id = ?1 AND status = 'open'",
                params![id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
