// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inline-button callback payload parsing.
//!
//! Payloads encode an action verb and a ticket id (`ticket_7`, `resolve_7`,
//! `update_7`). Parsing is defensive: unknown verbs and malformed ids are
//! rejected, never panicked on, since any client can send arbitrary callback
//! data.

/// An action decoded from a callback payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// `ticket_<id>` -- open the detail view.
    View(i64),
    /// `resolve_<id>` -- mark resolved.
    Resolve(i64),
    /// `update_<id>` -- start the update flow.
    Update(i64),
}

impl CallbackAction {
    pub fn ticket_id(self) -> i64 {
        match self {
            Self::View(id) | Self::Resolve(id) | Self::Update(id) => id,
        }
    }
}

/// Parses a callback payload, or `None` when it is malformed.
pub fn parse(data: &str) -> Option<CallbackAction> {
    let (verb, raw_id) = data.split_once('_')?;
    let id: i64 = raw_id.parse().ok()?;
    if id <= 0 {
        return None;
    }

    match verb {
        "ticket" => Some(CallbackAction::View(id)),
        "resolve" => Some(CallbackAction::Resolve(id)),
        "update" => Some(CallbackAction::Update(id)),
        _ => None,
    }
}
