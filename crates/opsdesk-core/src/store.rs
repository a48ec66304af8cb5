// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ticket store trait -- the seam between the flow engine and SQLite.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{Ticket, TicketSummary, TicketUpdate};

/// Persistence operations for tickets and their updates.
///
/// Every operation is atomic: a failure mid-operation leaves no partial row.
/// Reads surface their errors explicitly rather than degrading to an empty
/// result.
#[async_trait]
pub trait TicketStore {
    /// Creates a ticket and returns its id. Ids are strictly increasing.
    ///
    /// Fails with [`StoreError::Constraint`] when the description is blank.
    async fn create_ticket(
        &self,
        description: &str,
        photo_file_id: Option<&str>,
    ) -> Result<i64, StoreError>;

    /// Lists open tickets, newest first. An empty desk is an empty vec,
    /// not an error.
    async fn list_open_tickets(&self) -> Result<Vec<TicketSummary>, StoreError>;

    /// Fetches one ticket, or `None` when the id is unknown.
    async fn get_ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError>;

    /// Marks a ticket resolved. Returns whether a row actually transitioned;
    /// resolving an already-resolved or missing ticket returns `false` and
    /// never reverts a resolution.
    async fn resolve_ticket(&self, id: i64) -> Result<bool, StoreError>;

    /// Appends a free-text update to a ticket.
    ///
    /// Fails with [`StoreError::TicketNotFound`] when the ticket does not
    /// exist (enforced by the foreign key) and [`StoreError::Constraint`]
    /// when the text is blank.
    async fn append_update(
        &self,
        ticket_id: i64,
        author: &str,
        text: &str,
    ) -> Result<(), StoreError>;

    /// Lists a ticket's updates in ascending creation-time order.
    async fn list_updates(&self, ticket_id: i64) -> Result<Vec<TicketUpdate>, StoreError>;
}
