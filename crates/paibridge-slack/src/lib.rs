// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack adapter for paibridge.
//!
//! Implements [`ChatClient`] over the Slack Web API, maintains the Socket
//! Mode connection that delivers DM and mention events, and houses the
//! intake path that turns an inbound event into a queued job.

pub mod event;
pub mod intake;
pub mod socket;

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::debug;

use paibridge_core::{BridgeError, ChatClient, ChatMessage, UserProfile};

pub use event::SlackEvent;
pub use intake::Intake;
pub use socket::run_socket_mode;

/// Base URL for the Slack Web API.
const API_BASE_URL: &str = "https://slack.com/api";

/// Slack Web API client.
///
/// Holds the bot token for Web API calls and the app-level token for
/// opening Socket Mode connections. The bridge's own bot-user id is
/// resolved once via `auth.test` during [`SlackClient::connect`].
#[derive(Debug)]
pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    app_token: String,
    bot_user_id: OnceLock<String>,
}

impl SlackClient {
    /// Creates a client from the bot token (`xoxb-...`) and app-level
    /// token (`xapp-...`).
    pub fn new(bot_token: impl Into<String>, app_token: impl Into<String>) -> Result<Self, BridgeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/json; charset=utf-8"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BridgeError::Chat {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            base_url: API_BASE_URL.to_string(),
            bot_token: bot_token.into(),
            app_token: app_token.into(),
            bot_user_id: OnceLock::new(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Resolves the bridge's own bot-user id via `auth.test`.
    pub async fn connect(&self) -> Result<(), BridgeError> {
        let response = self.post("auth.test", &self.bot_token, Value::Null).await?;
        let user_id = response
            .get("user_id")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::chat("auth.test response missing user_id"))?;
        let _ = self.bot_user_id.set(user_id.to_string());
        debug!(bot_user_id = user_id, "authenticated with Slack");
        Ok(())
    }

    /// Opens a Socket Mode connection and returns the websocket URL.
    pub async fn open_socket_url(&self) -> Result<String, BridgeError> {
        let response = self
            .post("apps.connections.open", &self.app_token, Value::Null)
            .await?;
        response
            .get("url")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| BridgeError::chat("apps.connections.open response missing url"))
    }

    /// POSTs a JSON body to one Web API method.
    async fn post(&self, method: &str, token: &str, body: Value) -> Result<Value, BridgeError> {
        let url = format!("{}/{method}", self.base_url);
        let mut request = self.http.post(&url).bearer_auth(token);
        if !body.is_null() {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|e| BridgeError::Chat {
            message: format!("{method} request failed: {e}"),
            source: Some(Box::new(e)),
        })?;
        Self::check_envelope(method, response).await
    }

    /// GETs one Web API method with query parameters. Slack's read
    /// methods take form/query arguments, not JSON bodies.
    async fn get(
        &self,
        method: &str,
        token: &str,
        query: &[(&str, String)],
    ) -> Result<Value, BridgeError> {
        let url = format!("{}/{method}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| BridgeError::Chat {
                message: format!("{method} request failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        Self::check_envelope(method, response).await
    }

    /// Checks both HTTP status and the `ok`/`error` response envelope.
    async fn check_envelope(
        method: &str,
        response: reqwest::Response,
    ) -> Result<Value, BridgeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::chat(format!("{method} returned {status}: {body}")));
        }

        let parsed: Value = response.json().await.map_err(|e| BridgeError::Chat {
            message: format!("{method} returned unparseable body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if parsed.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = parsed
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(BridgeError::chat(format!("{method} failed: {error}")));
        }

        Ok(parsed)
    }
}

#[async_trait]
impl ChatClient for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
    ) -> Result<(), BridgeError> {
        let mut body = serde_json::json!({
            "channel": channel,
            "text": text,
        });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = ts.into();
        }
        self.post("chat.postMessage", &self.bot_token, body).await?;
        Ok(())
    }

    async fn list_replies(
        &self,
        channel: &str,
        ts: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, BridgeError> {
        let query = [
            ("channel", channel.to_string()),
            ("ts", ts.to_string()),
            ("inclusive", "true".to_string()),
            ("limit", limit.to_string()),
        ];
        let response = self.get("conversations.replies", &self.bot_token, &query).await?;

        let messages = response
            .get("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(messages
            .into_iter()
            .filter_map(|m| serde_json::from_value(m).ok())
            .collect())
    }

    async fn describe_user(&self, user_id: &str) -> Result<UserProfile, BridgeError> {
        let query = [("user", user_id.to_string())];
        let response = self.get("users.info", &self.bot_token, &query).await?;

        let user = response.get("user").cloned().unwrap_or(Value::Null);
        Ok(UserProfile {
            display_name: user
                .pointer("/profile/display_name")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from),
            real_name: user
                .get("real_name")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from),
            name: user
                .get("name")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(String::from),
        })
    }

    async fn is_direct_message(&self, channel: &str) -> Result<bool, BridgeError> {
        let query = [("channel", channel.to_string())];
        let response = self.get("conversations.info", &self.bot_token, &query).await?;
        Ok(response
            .pointer("/channel/is_im")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    fn bot_user_id(&self) -> &str {
        self.bot_user_id.get().map(String::as_str).unwrap_or("")
    }
}
