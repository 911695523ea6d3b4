// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./paibridge.toml` > `~/.config/paibridge/paibridge.toml`
//! > `/etc/paibridge/paibridge.toml` with environment overrides via the
//! `PAIBRIDGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::BridgeConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/paibridge/paibridge.toml` (system-wide)
/// 3. `~/.config/paibridge/paibridge.toml` (user XDG config)
/// 4. `./paibridge.toml` (local directory)
/// 5. `PAIBRIDGE_*` environment variables
pub fn load_config() -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::file("/etc/paibridge/paibridge.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("paibridge/paibridge.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("paibridge.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `PAIBRIDGE_SLACK_BOT_TOKEN` must map to
/// `slack.bot_token`, not `slack.bot.token`.
fn env_provider() -> Env {
    Env::prefixed("PAIBRIDGE_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped.
        // Example: PAIBRIDGE_SLACK_BOT_TOKEN -> "slack_bot_token"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("bridge_", "bridge.", 1)
            .replacen("slack_", "slack.", 1)
            .replacen("claude_", "claude.", 1)
            .replacen("queue_", "queue.", 1);
        mapped.into()
    })
}
