// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slash-command recognition.
//!
//! Commands are matched verbatim, tolerating the `@botname` suffix Telegram
//! appends in group chats. Anything else slash-shaped is left to the caller
//! to ignore.

/// The commands the desk understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    GetId,
    NewTicket,
    Skip,
    Cancel,
    Tickets,
}

/// Parses the leading command out of a message text.
///
/// Returns `None` for plain text and for unknown commands.
pub fn parse(text: &str) -> Option<BotCommand> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);

    match name {
        "start" => Some(BotCommand::Start),
        "getid" => Some(BotCommand::GetId),
        "newticket" => Some(BotCommand::NewTicket),
        "skip" => Some(BotCommand::Skip),
        "cancel" => Some(BotCommand::Cancel),
        "tickets" => Some(BotCommand::Tickets),
        _ => None,
    }
}
