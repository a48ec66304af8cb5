// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel layer for opsdesk.
//!
//! Connects to Telegram via long polling, turns updates into flow events,
//! and delivers outcomes back: replies for message-originated events, in-place
//! edits for button presses, and a fresh photo message when a detail view
//! carries an attachment (a photo cannot be edited into a text message).
//!
//! Each update is handled in its own dispatcher task; ordering for one user's
//! flow is the engine's job, not the transport's.

pub mod callback;
pub mod commands;
pub mod principal;
pub mod render;

use std::sync::Arc;

use opsdesk_config::model::TelegramConfig;
use opsdesk_core::{AuthPolicy, OpsdeskError, Principal};
use opsdesk_flow::{Event, FlowEngine, Outcome};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, InlineKeyboardMarkup, InputFile, MessageId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use callback::CallbackAction;
use commands::BotCommand;

/// The Telegram-facing half of the desk.
///
/// Owns the bot handle and dispatches updates into the shared [`FlowEngine`].
pub struct TicketChannel {
    bot: Bot,
    engine: Arc<FlowEngine>,
    policy: AuthPolicy,
}

impl TicketChannel {
    /// Creates the channel. Requires `config.bot_token` to be set.
    pub fn new(
        config: &TelegramConfig,
        engine: Arc<FlowEngine>,
        policy: AuthPolicy,
    ) -> Result<Self, OpsdeskError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            OpsdeskError::Config("telegram.bot_token is required to serve".into())
        })?;

        if token.is_empty() {
            return Err(OpsdeskError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        Ok(Self {
            bot: Bot::new(token),
            engine,
            policy,
        })
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Long-polls Telegram until the cancellation token fires.
    pub async fn run(self, cancel: CancellationToken) {
        let engine_m = self.engine.clone();
        let policy_m = self.policy.clone();
        let engine_c = self.engine.clone();

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
                let engine = engine_m.clone();
                let policy = policy_m.clone();
                async move { handle_message(bot, msg, engine, policy).await }
            }))
            .branch(
                Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
                    let engine = engine_c.clone();
                    async move { handle_callback(bot, q, engine).await }
                }),
            );

        info!("starting Telegram long polling");

        let mut dispatcher = Dispatcher::builder(self.bot, handler)
            .default_handler(|_| async {}) // Silently ignore other update kinds
            .build();

        tokio::select! {
            _ = dispatcher.dispatch() => {
                warn!("Telegram dispatcher stopped on its own");
            }
            _ = cancel.cancelled() => {
                info!("shutdown signal received, stopping Telegram polling");
            }
        }
    }
}

/// Handles one inbound message: commands first, then flow text/photo input.
async fn handle_message(
    bot: Bot,
    msg: Message,
    engine: Arc<FlowEngine>,
    policy: AuthPolicy,
) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        // Channel posts and service messages have no sender to authorize.
        return respond(());
    };
    let principal = principal::from_user(user);

    if let Some(text) = msg.text() {
        if let Some(cmd) = commands::parse(text) {
            return handle_command(bot, &msg, cmd, &principal, &engine, &policy).await;
        }
        if text.starts_with('/') {
            debug!(user_id = principal.id, "ignoring unknown command");
            return respond(());
        }
        let outcome = engine.handle_event(&principal, Event::Text(text.to_string())).await;
        return deliver_to_chat(&bot, &msg, &outcome).await;
    }

    if let Some(photos) = msg.photo() {
        // Telegram provides multiple sizes; the last one is the largest.
        let Some(largest) = photos.last() else {
            return respond(());
        };
        let event = Event::Photo {
            file_id: largest.file.id.to_string(),
        };
        let outcome = engine.handle_event(&principal, event).await;
        return deliver_to_chat(&bot, &msg, &outcome).await;
    }

    // Stickers, voice, locations: nothing the desk understands.
    respond(())
}

/// Handles a recognized slash command.
async fn handle_command(
    bot: Bot,
    msg: &Message,
    cmd: BotCommand,
    principal: &Principal,
    engine: &FlowEngine,
    policy: &AuthPolicy,
) -> ResponseResult<()> {
    match cmd {
        BotCommand::Start => {
            // Passive command: strangers get no response at all.
            if policy.is_authorized(principal) {
                bot.send_message(msg.chat.id, "Welcome to the ticket desk!").await?;
            }
            respond(())
        }
        BotCommand::GetId => {
            if !policy.is_authorized(principal) {
                return respond(());
            }
            match msg.reply_to_message().and_then(|reply| reply.from.as_ref()) {
                Some(author) => {
                    bot.send_message(
                        msg.chat.id,
                        format!("ID for {}: {}", author.full_name(), author.id),
                    )
                    .await?;
                }
                None => {
                    bot.send_message(
                        msg.chat.id,
                        "Please reply to a user's message to get their Telegram ID!",
                    )
                    .await?;
                }
            }
            respond(())
        }
        BotCommand::NewTicket => {
            let outcome = engine.handle_event(principal, Event::NewTicket).await;
            // The creation-entry denial has its own wording.
            if outcome == Outcome::NotAuthorized {
                bot.send_message(msg.chat.id, "You're not authorized to create tickets.")
                    .await?;
                return respond(());
            }
            deliver_to_chat(&bot, msg, &outcome).await
        }
        BotCommand::Skip => {
            let outcome = engine.handle_event(principal, Event::Skip).await;
            deliver_to_chat(&bot, msg, &outcome).await
        }
        BotCommand::Cancel => {
            let outcome = engine.handle_event(principal, Event::Cancel).await;
            deliver_to_chat(&bot, msg, &outcome).await
        }
        BotCommand::Tickets => {
            let outcome = engine.handle_event(principal, Event::ListTickets).await;
            deliver_to_chat(&bot, msg, &outcome).await
        }
    }
}

/// Delivers an outcome as a reply in the originating chat.
async fn deliver_to_chat(bot: &Bot, msg: &Message, outcome: &Outcome) -> ResponseResult<()> {
    match outcome {
        Outcome::Ignored => {}
        Outcome::OpenTickets(tickets) => {
            let (text, keyboard) = render::open_tickets(tickets);
            let request = bot.send_message(msg.chat.id, text);
            match keyboard {
                Some(kb) => request.reply_markup(kb).await?,
                None => request.await?,
            };
        }
        Outcome::Detail(view) => {
            // Detail normally renders off a button press; from a chat message
            // it is always a fresh send.
            let (text, kb) = render::detail(view);
            send_detail(bot, msg.chat.id, text, kb, view.ticket.photo_file_id.as_deref()).await?;
        }
        other => {
            if let Some(text) = render::notice(other) {
                bot.send_message(msg.chat.id, text).await?;
            }
        }
    }
    respond(())
}

/// Handles one button press. The originating message is edited in place,
/// except where a photo forces a fresh message.
async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    engine: Arc<FlowEngine>,
) -> ResponseResult<()> {
    let Some(data) = q.data.as_deref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return respond(());
    };
    let Some(action) = callback::parse(data) else {
        warn!(data, "rejecting malformed callback payload");
        bot.answer_callback_query(q.id.clone()).await?;
        return respond(());
    };

    let principal = principal::from_user(&q.from);
    let event = match action {
        CallbackAction::View(id) => Event::ViewTicket(id),
        CallbackAction::Resolve(id) => Event::ResolveTicket(id),
        CallbackAction::Update(id) => Event::ReplyToTicket(id),
    };
    let outcome = engine.handle_event(&principal, event).await;

    // A denied resolve is a toast on the button itself, not an edit; the
    // rendered view stays intact for the authorized readers.
    if let (CallbackAction::Resolve(_), Outcome::NotAuthorized) = (action, &outcome) {
        bot.answer_callback_query(q.id.clone()).text("❌ Unauthorized").await?;
        return respond(());
    }

    bot.answer_callback_query(q.id.clone()).await?;

    let Some(origin) = q.regular_message() else {
        debug!(user_id = principal.id, "callback origin inaccessible, dropping outcome");
        return respond(());
    };

    match &outcome {
        Outcome::Ignored => {}
        Outcome::NotAuthorized => {
            edit_text(&bot, origin.chat.id, origin.id, "❌ Unauthorized access").await?;
        }
        Outcome::Detail(view) => {
            let (text, kb) = render::detail(view);
            if let Some(file_id) = view.ticket.photo_file_id.as_deref() {
                // A photo cannot be edited into a text message; send a new
                // attachment-bearing message instead.
                send_detail(&bot, origin.chat.id, text, kb, Some(file_id)).await?;
            } else {
                bot.edit_message_text(origin.chat.id, origin.id, text)
                    .reply_markup(kb)
                    .await
                    .map(|_| ())
                    .or_else(tolerate_unmodified)?;
            }
        }
        other => {
            if let Some(text) = render::notice(other) {
                edit_text(&bot, origin.chat.id, origin.id, &text).await?;
            }
        }
    }
    respond(())
}

/// Sends a detail view: a captioned photo when the ticket carries one,
/// plain text otherwise.
async fn send_detail(
    bot: &Bot,
    chat_id: ChatId,
    text: String,
    keyboard: InlineKeyboardMarkup,
    photo_file_id: Option<&str>,
) -> ResponseResult<()> {
    match photo_file_id {
        Some(file_id) => {
            bot.send_photo(chat_id, InputFile::file_id(FileId(file_id.to_string())))
                .caption(text)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, text).reply_markup(keyboard).await?;
        }
    }
    respond(())
}

/// Edits a message's text, tolerating Telegram's "not modified" complaint
/// (pressing the same button twice is not an error).
async fn edit_text(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: &str,
) -> ResponseResult<()> {
    bot.edit_message_text(chat_id, message_id, text)
        .await
        .map(|_| ())
        .or_else(tolerate_unmodified)
}

fn tolerate_unmodified(e: teloxide::RequestError) -> ResponseResult<()> {
    if e.to_string().contains("message is not modified") {
        Ok(())
    } else {
        Err(e)
    }
}
