// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the paibridge Slack agent bridge.
//!
//! This crate provides the domain types, the workspace error type, and the
//! [`ChatClient`] trait describing the chat-platform capabilities the rest
//! of the workspace consumes.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::BridgeError;
pub use traits::ChatClient;
pub use types::{
    ChatMessage, Job, Notification, QueueStatus, Role, ThreadFile, ThreadMessage, UserProfile,
    BRIDGE_DISPLAY_NAME,
};
