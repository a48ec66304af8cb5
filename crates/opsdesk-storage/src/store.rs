// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`TicketStore`] trait.

use async_trait::async_trait;
use tracing::debug;

use opsdesk_config::model::StorageConfig;
use opsdesk_core::{StoreError, Ticket, TicketStore, TicketSummary, TicketUpdate};

use crate::database::Database;
use crate::queries;

/// SQLite-backed ticket store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules.
pub struct SqliteTicketStore {
    db: Database,
}

impl SqliteTicketStore {
    /// Opens the database at the configured path, running migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "ticket store ready");
        Ok(Self { db })
    }

    /// Checkpoints the WAL. Called on graceful shutdown.
    pub async fn close(&self) -> Result<(), StoreError> {
        self.db.checkpoint().await
    }
}

#[async_trait]
impl TicketStore for SqliteTicketStore {
    async fn create_ticket(
        &self,
        description: &str,
        photo_file_id: Option<&str>,
    ) -> Result<i64, StoreError> {
        queries::tickets::create_ticket(&self.db, description, photo_file_id).await
    }

    async fn list_open_tickets(&self) -> Result<Vec<TicketSummary>, StoreError> {
        queries::tickets::list_open_tickets(&self.db).await
    }

    async fn get_ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        queries::tickets::get_ticket(&self.db, id).await
    }

    async fn resolve_ticket(&self, id: i64) -> Result<bool, StoreError> {
        queries::tickets::resolve_ticket(&self.db, id).await
    }

    async fn append_update(
        &self,
        ticket_id: i64,
        author: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        queries::updates::append_update(&self.db, ticket_id, author, text).await
    }

    async fn list_updates(&self, ticket_id: i64) -> Result<Vec<TicketUpdate>, StoreError> {
        queries::updates::list_updates(&self.db, ticket_id).await
    }
}
