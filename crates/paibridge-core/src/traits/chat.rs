// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat platform client trait.
//!
//! The minimal capability set the bridge core consumes from the chat
//! platform SDK: message posting, thread history, user lookup, DM
//! classification, and the bridge's own bot identity. The Slack adapter
//! implements this over the Web API; tests use a scripted mock.

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::types::{ChatMessage, UserProfile};

/// Client for the chat platform the bridge is connected to.
#[async_trait]
pub trait ChatClient: Send + Sync + 'static {
    /// Posts `text` to `channel`, optionally as a reply inside a thread.
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), BridgeError>;

    /// Lists up to `limit` messages of the thread rooted at `ts`,
    /// inclusive of the root, in thread order.
    async fn list_replies(
        &self,
        channel: &str,
        ts: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, BridgeError>;

    /// Looks up profile fields for a platform user id.
    async fn describe_user(&self, user_id: &str) -> Result<UserProfile, BridgeError>;

    /// Returns whether `channel` is a direct-message conversation.
    async fn is_direct_message(&self, channel: &str) -> Result<bool, BridgeError>;

    /// The bridge's own bot-user id, resolved once at connect time.
    /// Used to classify the bridge's past messages as `assistant`.
    fn bot_user_id(&self) -> &str;
}
