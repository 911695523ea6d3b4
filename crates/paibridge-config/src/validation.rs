// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: required connection tokens, non-empty paths, and positive
//! intervals.

use thiserror::Error;

use crate::model::BridgeConfig;

/// A configuration validation failure.
#[derive(Debug, Error)]
#[error("validation error: {message}")]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Validate a configuration for running `serve`.
///
/// Returns all collected validation errors (does not fail fast). A missing
/// Slack token is a fatal startup condition, not a runtime fallback.
pub fn validate_for_serve(config: &BridgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    match &config.slack.bot_token {
        Some(token) if !token.trim().is_empty() => {}
        _ => errors.push(ConfigError::new(
            "slack.bot_token is required (set PAIBRIDGE_SLACK_BOT_TOKEN or paibridge.toml)",
        )),
    }

    match &config.slack.app_token {
        Some(token) if !token.trim().is_empty() => {}
        _ => errors.push(ConfigError::new(
            "slack.app_token is required for Socket Mode (set PAIBRIDGE_SLACK_APP_TOKEN)",
        )),
    }

    if config.claude.cli_path.trim().is_empty() {
        errors.push(ConfigError::new("claude.cli_path must not be empty"));
    }

    if config.claude.max_output_chars == 0 {
        errors.push(ConfigError::new(
            "claude.max_output_chars must be greater than zero",
        ));
    }

    if config.queue.base_dir.trim().is_empty() {
        errors.push(ConfigError::new("queue.base_dir must not be empty"));
    }

    if config.queue.poll_interval_ms == 0 {
        errors.push(ConfigError::new(
            "queue.poll_interval_ms must be greater than zero",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
