// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization policy: pure predicates, no I/O.
//!
//! Two independent facts apply to every principal: membership in the
//! configured allow-lists (`is_authorized`) and being the collector
//! (`is_collector`). Neither implies the other -- the collector keeps its
//! powers without being allow-listed, and allow-listed users never gain
//! collector powers.

use crate::types::Principal;

/// Immutable authorization policy, built once from configuration.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    allowed_ids: Vec<String>,
    allowed_usernames: Vec<String>,
    collector_id: i64,
}

impl AuthPolicy {
    /// Builds a policy from raw configuration entries.
    ///
    /// Entries are normalized: whitespace trimmed, usernames lowercased with
    /// any leading `@` stripped, and comma-joined entries split so both TOML
    /// lists and comma-separated environment values are accepted. Empty
    /// fragments are dropped.
    pub fn new(allowed_ids: &[String], allowed_usernames: &[String], collector_id: i64) -> Self {
        let allowed_ids = split_entries(allowed_ids).collect();
        let allowed_usernames = split_entries(allowed_usernames)
            .map(|u| u.strip_prefix('@').unwrap_or(&u).to_lowercase())
            .collect();

        Self {
            allowed_ids,
            allowed_usernames,
            collector_id,
        }
    }

    /// True iff the principal's id is allow-listed or its username matches an
    /// allow-listed handle case-insensitively.
    pub fn is_authorized(&self, principal: &Principal) -> bool {
        let id = principal.id.to_string();
        if self.allowed_ids.iter().any(|allowed| *allowed == id) {
            return true;
        }

        match principal.username.as_deref() {
            Some(username) => self
                .allowed_usernames
                .iter()
                .any(|allowed| username.eq_ignore_ascii_case(allowed)),
            None => false,
        }
    }

    /// True iff the id is exactly the configured collector id.
    pub fn is_collector(&self, user_id: i64) -> bool {
        user_id == self.collector_id
    }
}

/// Flattens configured entries: splits on commas, trims, drops empties.
fn split_entries(entries: &[String]) -> impl Iterator<Item = String> + '_ {
    entries
        .iter()
        .flat_map(|entry| entry.split(','))
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
}
