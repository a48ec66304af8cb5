// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket update operations.

use opsdesk_core::{StoreError, TicketUpdate};
use rusqlite::params;

use crate::database::Database;

/// Append a free-text update to a ticket.
///
/// The foreign key on `ticket_id` is the existence check: a rejected key
/// surfaces as [`StoreError::TicketNotFound`].
pub async fn append_update(
    db: &Database,
    ticket_id: i64,
    author: &str,
    text: &str,
) -> Result<(), StoreError> {
    if text.trim().is_empty() {
        return Err(StoreError::Constraint(
            "update text must not be empty".into(),
        ));
    }

    let author = author.to_string();
    let text = text.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO ticket_updates (ticket_id, username, update_text)
                 VALUES (?1, ?2, ?3)",
                params![ticket_id, author, text],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| {
            if crate::database::is_foreign_key_violation(&e) {
                StoreError::TicketNotFound(ticket_id)
            } else {
                crate::database::map_tr_err(e)
            }
        })
}

/// List a ticket's updates, oldest first.
pub async fn list_updates(db: &Database, ticket_id: i64) -> Result<Vec<TicketUpdate>, StoreError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT update_text, username, created_at
                 FROM ticket_updates
                 WHERE ticket_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![ticket_id], |row| {
                Ok(TicketUpdate {
                    text: row.get(0)?,
                    author: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?;

            let mut updates = Vec::new();
            for row in rows {
                updates.push(row?);
            }
            Ok(updates)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
