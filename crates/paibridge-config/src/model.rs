// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for paibridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, producing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level paibridge configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values; the tokens required to actually connect are checked by
/// [`crate::validation::validate_for_serve`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Bridge identity and logging settings.
    #[serde(default)]
    pub bridge: BridgeSection,

    /// Slack connection settings.
    #[serde(default)]
    pub slack: SlackConfig,

    /// Agent CLI invocation settings.
    #[serde(default)]
    pub claude: ClaudeConfig,

    /// Durable queue and thread store settings.
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Bridge identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeSection {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enables verbose event logging regardless of `log_level`.
    #[serde(default)]
    pub debug: bool,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            debug: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Slack connection configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`). Required to serve.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// App-level token (`xapp-...`) for Socket Mode. Required to serve.
    #[serde(default)]
    pub app_token: Option<String>,

    /// Signing secret. Unused over Socket Mode but accepted for parity
    /// with HTTP-mode deployments.
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// User ids allowed to talk to the bridge. Empty list allows everyone.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Channel ids the bridge responds in. Empty list allows every channel.
    #[serde(default)]
    pub allowed_channels: Vec<String>,
}

/// Agent CLI invocation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClaudeConfig {
    /// Path to the agent CLI executable.
    #[serde(default = "default_cli_path")]
    pub cli_path: String,

    /// Working directory the agent CLI runs in.
    #[serde(default = "default_working_dir")]
    pub working_dir: String,

    /// Maximum size of agent output forwarded to the chat, in characters.
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            working_dir: default_working_dir(),
            max_output_chars: default_max_output_chars(),
        }
    }
}

fn default_cli_path() -> String {
    "claude".to_string()
}

fn default_working_dir() -> String {
    ".".to_string()
}

fn default_max_output_chars() -> usize {
    4000
}

/// Durable queue and thread store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Base directory holding the four queue state directories.
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// Processor poll interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Thread transcripts older than this are garbage-collected.
    #[serde(default = "default_thread_max_age_hours")]
    pub thread_max_age_hours: u64,
}

impl QueueConfig {
    /// Directory for thread transcript files.
    ///
    /// The `__THREAD_STORE_DIR` environment override exists for tests only.
    pub fn thread_store_dir(&self) -> std::path::PathBuf {
        if let Ok(dir) = std::env::var("__THREAD_STORE_DIR") {
            if !dir.is_empty() {
                return std::path::PathBuf::from(dir);
            }
        }
        std::path::Path::new(&self.base_dir).join("threads")
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            poll_interval_ms: default_poll_interval_ms(),
            thread_max_age_hours: default_thread_max_age_hours(),
        }
    }
}

fn default_base_dir() -> String {
    "/tmp/pai-slack-queue".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_thread_max_age_hours() -> u64 {
    72
}
