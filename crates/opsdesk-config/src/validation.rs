// SPDX-FileCopyrightText: 2026 Opsdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as numeric allow-list entries and known log levels.

use crate::diagnostic::ConfigError;
use crate::model::OpsdeskConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &OpsdeskConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "service.log_level `{}` is not one of {}",
                config.service.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if config.telegram.collector_id < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "telegram.collector_id must be non-negative, got {}",
                config.telegram.collector_id
            ),
        });
    }

    // Allow-listed ids must be numeric once comma-joined entries are split.
    for entry in &config.telegram.allowed_ids {
        for fragment in entry.split(',') {
            let fragment = fragment.trim();
            if !fragment.is_empty() && fragment.parse::<i64>().is_err() {
                errors.push(ConfigError::Validation {
                    message: format!(
                        "telegram.allowed_ids entry `{fragment}` is not a numeric user id"
                    ),
                });
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = OpsdeskConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = OpsdeskConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))
        ));
    }

    #[test]
    fn unknown_log_level_fails_validation() {
        let mut config = OpsdeskConfig::default();
        config.service.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("log_level"))
        ));
    }

    #[test]
    fn negative_collector_id_fails_validation() {
        let mut config = OpsdeskConfig::default();
        config.telegram.collector_id = -1;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("collector_id"))
        ));
    }

    #[test]
    fn non_numeric_allowed_id_fails_validation() {
        let mut config = OpsdeskConfig::default();
        config.telegram.allowed_ids = vec!["123,abc".to_string()];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(
            |e| matches!(e, ConfigError::Validation { message } if message.contains("`abc`"))
        ));
    }

    #[test]
    fn comma_joined_numeric_ids_pass_validation() {
        let mut config = OpsdeskConfig::default();
        config.telegram.allowed_ids = vec!["123, 456".to_string()];
        assert!(validate_config(&config).is_ok());
    }
}
