// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the paibridge workspace.

use thiserror::Error;

/// The primary error type used across all paibridge crates.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors (invalid TOML, missing required tokens).
    #[error("configuration error: {0}")]
    Config(String),

    /// Thread store and queue filesystem errors.
    #[error("storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Chat platform errors (HTTP failure, API error envelope, socket loss).
    #[error("chat error: {message}")]
    Chat {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Agent CLI errors (spawn failure, broken pipes).
    #[error("agent error: {message}")]
    Agent {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A queued job file failed validation or parsing.
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Wraps an IO error with a context message into a `Storage` variant.
    pub fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source,
        }
    }

    /// Builds a `Chat` error from a message alone.
    pub fn chat(message: impl Into<String>) -> Self {
        Self::Chat {
            message: message.into(),
            source: None,
        }
    }
}
