// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the opsdesk crates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a ticket. Transitions open -> resolved exactly once.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Resolved,
}

/// A persisted support ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub description: String,
    /// Opaque Telegram file id of the attached photo, if any. Set at creation
    /// and never changed.
    pub photo_file_id: Option<String>,
    pub status: TicketStatus,
    /// ISO-8601 UTC timestamp, assigned by the database.
    pub created_at: String,
}

/// The subset of ticket fields needed to render the open-ticket list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketSummary {
    pub id: i64,
    pub description: String,
    pub photo_file_id: Option<String>,
}

/// An append-only note attached to a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketUpdate {
    pub text: String,
    pub author: String,
    /// ISO-8601 UTC timestamp, assigned by the database. Display ordering key.
    pub created_at: String,
}

/// The sender of an inbound event. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

impl Principal {
    /// Handle recorded as the author of ticket updates: the username when one
    /// exists, the first name otherwise.
    pub fn display_handle(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.first_name)
    }
}
