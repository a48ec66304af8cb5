// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for opsdesk.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level opsdesk configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpsdeskConfig {
    /// Service identity and logging settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Telegram bot and authorization settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name of the service.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "opsdesk".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telegram bot and authorization configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. `None` means the bot cannot be served.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Numeric user ids permitted to use the tracker. Entries may be
    /// comma-joined (environment convention) or separate list items.
    #[serde(default)]
    pub allowed_ids: Vec<String>,

    /// Usernames permitted to use the tracker, matched case-insensitively,
    /// with or without a leading `@`.
    #[serde(default)]
    pub allowed_usernames: Vec<String>,

    /// User id of the collector -- the single principal empowered to create
    /// and resolve tickets. 0 means no collector is configured.
    #[serde(default)]
    pub collector_id: i64,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("opsdesk").join("opsdesk.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("opsdesk.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}
