// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules. One fixed row structure per query.

pub mod tickets;
pub mod updates;
