// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rendering of flow outcomes into Telegram text and inline keyboards.
//!
//! Everything is plain text. Descriptions and updates are user-supplied, so
//! any parse mode would need escaping and a fallback path for nothing in
//! return; plain text cannot be rejected by the Bot API.

use opsdesk_core::TicketSummary;
use opsdesk_flow::{FailedOp, Outcome, TicketView};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Renders the open-ticket list: header text plus one selectable row per
/// ticket. An empty desk gets a plain notice and no keyboard.
pub fn open_tickets(tickets: &[TicketSummary]) -> (String, Option<InlineKeyboardMarkup>) {
    if tickets.is_empty() {
        return ("No open tickets found!".to_string(), None);
    }

    let rows: Vec<Vec<InlineKeyboardButton>> = tickets
        .iter()
        .map(|t| {
            vec![InlineKeyboardButton::callback(
                format!("🎫 Ticket {}", t.id),
                format!("ticket_{}", t.id),
            )]
        })
        .collect();

    ("📋 Open Tickets:".to_string(), Some(InlineKeyboardMarkup::new(rows)))
}

/// Renders a ticket detail view: description, the updates section when any
/// exist, and 0-2 action buttons depending on the viewer's role.
pub fn detail(view: &TicketView) -> (String, InlineKeyboardMarkup) {
    let mut text = format!("📝 Ticket {}\n\n{}", view.ticket.id, view.ticket.description);

    if !view.updates.is_empty() {
        text.push_str("\n\nUpdates:");
        for update in &view.updates {
            text.push_str(&format!(
                "\n\n{} - {}:\n{}",
                time_of_day(&update.created_at),
                update.author,
                update.text
            ));
        }
    }

    let mut rows = Vec::new();
    if view.can_reply {
        rows.push(vec![InlineKeyboardButton::callback(
            "💬 Reply/Update",
            format!("update_{}", view.ticket.id),
        )]);
    }
    if view.can_resolve {
        rows.push(vec![InlineKeyboardButton::callback(
            "✅ Mark Resolved",
            format!("resolve_{}", view.ticket.id),
        )]);
    }

    (text, InlineKeyboardMarkup::new(rows))
}

/// The `HH:MM` part of a stored timestamp, for update lines.
pub fn time_of_day(created_at: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(created_at) {
        Ok(dt) => dt.format("%H:%M").to_string(),
        // Stored timestamps are ISO-8601; slice out the clock if one is
        // somehow unparseable.
        Err(_) => created_at.get(11..16).unwrap_or("").to_string(),
    }
}

/// The short reply for outcomes that render as a plain notice.
///
/// `OpenTickets` and `Detail` carry structure and render elsewhere; `Ignored`
/// renders as nothing at all.
pub fn notice(outcome: &Outcome) -> Option<String> {
    let text = match outcome {
        Outcome::Ignored | Outcome::OpenTickets(_) | Outcome::Detail(_) => return None,
        Outcome::NotAuthorized => "You're not authorized to do that.".to_string(),
        Outcome::PromptDescription => "Please send the ticket's details.".to_string(),
        Outcome::PromptPhotoOrSkip => {
            "Send a photo for this ticket or /skip to continue without photo.".to_string()
        }
        Outcome::PromptUpdateText => "Please send your update:".to_string(),
        Outcome::CreationCancelled => "Ticket creation cancelled.".to_string(),
        Outcome::TicketCreated { ticket_id, with_photo: true } => {
            format!("Ticket #{ticket_id} created with photo ✅")
        }
        Outcome::TicketCreated { ticket_id, with_photo: false } => {
            format!("Ticket #{ticket_id} created without photo ✅")
        }
        Outcome::UpdateSaved => "Update added successfully ✅".to_string(),
        Outcome::SessionExpired => "Session expired. Please start over.".to_string(),
        Outcome::TicketMissing => "Ticket not found ❌".to_string(),
        Outcome::Resolved { ticket_id } => format!("Ticket {ticket_id} resolved ✅"),
        Outcome::ResolveFailed { ticket_id } => {
            format!("Failed to resolve ticket {ticket_id}")
        }
        Outcome::Failed(op) => failure_notice(*op).to_string(),
    };
    Some(text)
}

fn failure_notice(op: FailedOp) -> &'static str {
    match op {
        FailedOp::CreateTicket => "Failed to create ticket. Please try again.",
        FailedOp::LoadTickets => "Failed to load tickets. Please try again.",
        FailedOp::LoadTicket => "An error occurred. Please try again.",
        FailedOp::SaveUpdate => "Failed to add update. Please try again.",
        FailedOp::Resolve => "Failed to resolve ticket. Please try again.",
    }
}
