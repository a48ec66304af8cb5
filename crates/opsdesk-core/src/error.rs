// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for opsdesk.

use thiserror::Error;

/// Failures surfaced by the ticket store.
///
/// Every store operation fails with exactly one of these. `Connection` covers
/// everything transport-shaped (the writer thread died, the database file is
/// gone, opening ran out of retries); `Constraint` covers rejected writes;
/// `TicketNotFound` covers a foreign key pointing at a ticket that does not
/// exist.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be reached or the operation could not complete.
    #[error("database connection failed: {source}")]
    Connection {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A write was rejected by a validation or schema constraint.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// The referenced ticket does not exist.
    #[error("ticket {0} not found")]
    TicketNotFound(i64),
}

/// The primary error type used across opsdesk crates.
#[derive(Debug, Error)]
pub enum OpsdeskError {
    /// Configuration errors (missing token, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence errors, bubbled up from the ticket store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Telegram transport errors (send/edit failure, polling failure).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
