// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound events and flow outcomes.
//!
//! Outcomes are plain values: every transition, including the terminating
//! ones, reports what happened through its return value. The channel layer
//! owns the wording and delivery; the engine owns the decisions.

use opsdesk_core::{Ticket, TicketSummary, TicketUpdate};

/// A channel-agnostic inbound event, after parsing and principal extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `/newticket` -- start the creation flow (collector only).
    NewTicket,
    /// `/skip` -- finish creation without a photo.
    Skip,
    /// `/cancel` -- abort the creation flow.
    Cancel,
    /// `/tickets` -- list open tickets.
    ListTickets,
    /// A ticket entry was selected from the list.
    ViewTicket(i64),
    /// The resolve control was pressed (collector only).
    ResolveTicket(i64),
    /// The reply control was pressed -- start the update flow.
    ReplyToTicket(i64),
    /// A free-text message.
    Text(String),
    /// A photo message, carrying the channel's opaque file handle.
    Photo { file_id: String },
}

/// What a handled event produced, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to say: event out of place, or a passive command from an
    /// unauthorized sender.
    Ignored,
    /// Explicit denial for an action the sender may not perform.
    NotAuthorized,
    /// Ask for the ticket description.
    PromptDescription,
    /// Ask for a photo or `/skip`.
    PromptPhotoOrSkip,
    /// Ask for the update text.
    PromptUpdateText,
    /// Creation flow aborted, pending payload discarded.
    CreationCancelled,
    /// A ticket was created.
    TicketCreated { ticket_id: i64, with_photo: bool },
    /// An update was appended.
    UpdateSaved,
    /// The update flow had no ticket id to write against.
    SessionExpired,
    /// The open-ticket list, newest first. May be empty.
    OpenTickets(Vec<TicketSummary>),
    /// A ticket detail view with role-dependent controls.
    Detail(TicketView),
    /// The ticket transitioned open -> resolved.
    Resolved { ticket_id: i64 },
    /// The resolve changed nothing (already resolved or gone).
    ResolveFailed { ticket_id: i64 },
    /// The referenced ticket does not exist.
    TicketMissing,
    /// A store operation failed; the flow, if any, was terminated.
    Failed(FailedOp),
}

/// Data needed to render a ticket detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketView {
    pub ticket: Ticket,
    pub updates: Vec<TicketUpdate>,
    /// Show the reply control (any authorized principal).
    pub can_reply: bool,
    /// Show the resolve control (collector only).
    pub can_resolve: bool,
}

/// The operation behind a [`Outcome::Failed`], for a specific notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedOp {
    CreateTicket,
    LoadTickets,
    LoadTicket,
    SaveUpdate,
    Resolve,
}
