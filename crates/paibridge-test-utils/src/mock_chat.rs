// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat client for deterministic testing.
//!
//! `MockChatClient` implements [`ChatClient`] with scripted thread
//! histories and user profiles, and captures every posted message for
//! assertion in tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use paibridge_core::{BridgeError, ChatClient, ChatMessage, UserProfile};

/// One message captured by [`MockChatClient::post_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub thread_ts: Option<String>,
    pub text: String,
}

/// A scripted chat platform for tests.
///
/// - **replies**: thread histories registered via `add_replies()` are
///   returned by `list_replies()`
/// - **users**: profiles registered via `add_user()` are returned by
///   `describe_user()`; unknown ids error like the real endpoint
/// - **posted**: messages passed to `post_message()` are captured and
///   retrievable via `posted()`
pub struct MockChatClient {
    bot_user_id: String,
    replies: Mutex<HashMap<String, Vec<ChatMessage>>>,
    users: Mutex<HashMap<String, UserProfile>>,
    user_lookups: Mutex<HashMap<String, usize>>,
    dm_channels: Mutex<HashSet<String>>,
    posted: Mutex<Vec<PostedMessage>>,
    fail_posts: Mutex<bool>,
}

impl MockChatClient {
    /// Creates a mock whose own bot-user id is `bot_user_id`.
    pub fn new(bot_user_id: impl Into<String>) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            replies: Mutex::new(HashMap::new()),
            users: Mutex::new(HashMap::new()),
            user_lookups: Mutex::new(HashMap::new()),
            dm_channels: Mutex::new(HashSet::new()),
            posted: Mutex::new(Vec::new()),
            fail_posts: Mutex::new(false),
        }
    }

    /// Registers the thread history returned for `thread_ts`.
    pub async fn add_replies(&self, thread_ts: &str, replies: Vec<ChatMessage>) {
        self.replies.lock().await.insert(thread_ts.to_string(), replies);
    }

    /// Registers a user with the given display name.
    pub async fn add_user(&self, user_id: &str, display_name: &str) {
        self.users.lock().await.insert(
            user_id.to_string(),
            UserProfile {
                display_name: Some(display_name.to_string()),
                real_name: None,
                name: None,
            },
        );
    }

    /// Marks `channel` as a direct-message conversation.
    pub async fn add_dm_channel(&self, channel: &str) {
        self.dm_channels.lock().await.insert(channel.to_string());
    }

    /// Makes every subsequent `post_message` fail.
    pub async fn set_post_failure(&self, fail: bool) {
        *self.fail_posts.lock().await = fail;
    }

    /// All messages posted so far, in order.
    pub async fn posted(&self) -> Vec<PostedMessage> {
        self.posted.lock().await.clone()
    }

    /// Count of posted messages.
    pub async fn posted_count(&self) -> usize {
        self.posted.lock().await.len()
    }

    /// Clears captured posts.
    pub async fn clear_posted(&self) {
        self.posted.lock().await.clear();
    }

    /// How many times `describe_user` was called for `user_id`.
    pub async fn user_lookup_count(&self, user_id: &str) -> usize {
        self.user_lookups.lock().await.get(user_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), BridgeError> {
        if *self.fail_posts.lock().await {
            return Err(BridgeError::chat("mock post failure"));
        }
        self.posted.lock().await.push(PostedMessage {
            channel: channel.to_string(),
            thread_ts: thread_ts.map(String::from),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn list_replies(
        &self,
        _channel: &str,
        ts: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, BridgeError> {
        let replies = self.replies.lock().await;
        let mut messages = replies.get(ts).cloned().unwrap_or_default();
        messages.truncate(limit as usize);
        Ok(messages)
    }

    async fn describe_user(&self, user_id: &str) -> Result<UserProfile, BridgeError> {
        *self
            .user_lookups
            .lock()
            .await
            .entry(user_id.to_string())
            .or_insert(0) += 1;
        self.users
            .lock()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| BridgeError::chat(format!("user_not_found: {user_id}")))
    }

    async fn is_direct_message(&self, channel: &str) -> Result<bool, BridgeError> {
        Ok(self.dm_channels.lock().await.contains(channel))
    }

    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn post_message_is_captured() {
        let chat = MockChatClient::new("U_BOT");
        chat.post_message("C1", Some("1.2"), "hello").await.unwrap();

        let posted = chat.posted().await;
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].channel, "C1");
        assert_eq!(posted[0].thread_ts.as_deref(), Some("1.2"));
        assert_eq!(posted[0].text, "hello");
    }

    #[tokio::test]
    async fn post_failure_mode_returns_error() {
        let chat = MockChatClient::new("U_BOT");
        chat.set_post_failure(true).await;
        assert!(chat.post_message("C1", None, "x").await.is_err());
        assert_eq!(chat.posted_count().await, 0);
    }

    #[tokio::test]
    async fn list_replies_respects_limit() {
        let chat = MockChatClient::new("U_BOT");
        let replies: Vec<ChatMessage> = (0..30)
            .map(|i| ChatMessage {
                ts: format!("1.{i}"),
                user: Some("U1".into()),
                bot_id: None,
                text: Some(format!("m{i}")),
            })
            .collect();
        chat.add_replies("root", replies).await;

        let listed = chat.list_replies("C1", "root", 20).await.unwrap();
        assert_eq!(listed.len(), 20);
    }

    #[tokio::test]
    async fn describe_unknown_user_errors() {
        let chat = MockChatClient::new("U_BOT");
        assert!(chat.describe_user("U_NOBODY").await.is_err());
        assert_eq!(chat.user_lookup_count("U_NOBODY").await, 1);
    }

    #[tokio::test]
    async fn dm_channels_are_classified() {
        let chat = MockChatClient::new("U_BOT");
        chat.add_dm_channel("D1").await;
        assert!(chat.is_direct_message("D1").await.unwrap());
        assert!(!chat.is_direct_message("C1").await.unwrap());
    }
}
