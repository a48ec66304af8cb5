// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flow identity and state.
//!
//! Flow state is ephemeral: it lives in memory, is keyed per user and per
//! flow kind, and vanishes on restart. Abandoned flows need no cleanup.

/// Which multi-step conversation a state cell belongs to.
///
/// A user may hold one flow of each kind at a time; starting a kind again
/// discards that kind's pending payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Creation,
    Update,
}

/// Position inside a flow, with the payload gathered so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    /// Ticket creation: waiting for the description text.
    AwaitingDescription,

    /// Ticket creation: description captured, waiting for a photo or `/skip`.
    AwaitingPhotoOrSkip { description: String },

    /// Ticket update: waiting for the update text. The ticket id can be
    /// absent when the flow outlived its payload (a restart mid-flow); such
    /// a flow ends with a session-expired notice instead of writing.
    AwaitingUpdateText { ticket_id: Option<i64> },
}
