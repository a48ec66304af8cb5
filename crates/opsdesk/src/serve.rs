// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `opsdesk serve` command implementation.
//!
//! Wires the pieces together: SQLite ticket store, authorization policy,
//! flow engine, and the Telegram channel. Supports graceful shutdown via
//! ctrl-c, checkpointing the WAL on the way out.

use std::sync::Arc;

use opsdesk_config::model::OpsdeskConfig;
use opsdesk_core::{AuthPolicy, OpsdeskError, TicketStore};
use opsdesk_flow::FlowEngine;
use opsdesk_storage::SqliteTicketStore;
use opsdesk_telegram::TicketChannel;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs the `opsdesk serve` command.
pub async fn run_serve(config: OpsdeskConfig) -> Result<(), OpsdeskError> {
    init_tracing(&config.service.log_level);

    info!(service = config.service.name.as_str(), "starting opsdesk serve");

    // Storage: constructed once, shared by reference, torn down at shutdown.
    let store = Arc::new(SqliteTicketStore::open(&config.storage).await?);
    info!(path = config.storage.database_path.as_str(), "ticket store opened");

    let policy = AuthPolicy::new(
        &config.telegram.allowed_ids,
        &config.telegram.allowed_usernames,
        config.telegram.collector_id,
    );
    if config.telegram.collector_id == 0 {
        warn!("telegram.collector_id is not set; nobody can create or resolve tickets");
    }

    let engine = Arc::new(FlowEngine::new(
        store.clone() as Arc<dyn TicketStore + Send + Sync>,
        policy.clone(),
    ));

    let channel = TicketChannel::new(&config.telegram, engine, policy).map_err(|e| {
        error!(error = %e, "failed to initialize Telegram channel");
        eprintln!("error: Telegram bot token required. Set telegram.bot_token or OPSDESK_TELEGRAM_BOT_TOKEN.");
        e
    })?;

    let cancel = install_signal_handler();
    channel.run(cancel).await;

    store.close().await?;
    info!("opsdesk serve shutdown complete");
    Ok(())
}

/// Installs a ctrl-c handler that trips the returned cancellation token.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trip = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received, shutting down");
                trip.cancel();
            }
            Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
        }
    });
    token
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("opsdesk={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
