// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound Slack event shapes.

use serde::Deserialize;

/// A DM or mention event as delivered by the Events API.
///
/// Only `message` and `app_mention` events reach the intake path; other
/// event types are dropped at the socket layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackEvent {
    /// Event type: `message` or `app_mention`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Present on non-user messages (edits, joins, bot posts). Any
    /// subtype disqualifies the event.
    #[serde(default)]
    pub subtype: Option<String>,
    /// Authoring user id.
    #[serde(default)]
    pub user: Option<String>,
    /// Set when the message was produced by a bot integration.
    #[serde(default)]
    pub bot_id: Option<String>,
    /// Message text.
    #[serde(default)]
    pub text: Option<String>,
    /// Conversation the event occurred in.
    #[serde(default)]
    pub channel: String,
    /// Timestamp of this message.
    #[serde(default)]
    pub ts: String,
    /// Set when the message is a reply inside a thread.
    #[serde(default)]
    pub thread_ts: Option<String>,
    /// Conversation kind hint (`im`, `channel`, ...). The intake path
    /// confirms DMs against the platform rather than trusting this.
    #[serde(default)]
    pub channel_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mention_event_parses() {
        let event: SlackEvent = serde_json::from_value(serde_json::json!({
            "type": "app_mention",
            "user": "U1",
            "text": "<@U_BRIDGE> do the thing",
            "channel": "C1",
            "ts": "1700000000.000100",
        }))
        .unwrap();
        assert_eq!(event.event_type, "app_mention");
        assert_eq!(event.user.as_deref(), Some("U1"));
        assert!(event.thread_ts.is_none());
    }

    #[test]
    fn threaded_dm_event_parses() {
        let event: SlackEvent = serde_json::from_value(serde_json::json!({
            "type": "message",
            "user": "U1",
            "text": "following up",
            "channel": "D1",
            "channel_type": "im",
            "ts": "1700000000.000200",
            "thread_ts": "1700000000.000100",
        }))
        .unwrap();
        assert_eq!(event.event_type, "message");
        assert_eq!(event.thread_ts.as_deref(), Some("1700000000.000100"));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let event: SlackEvent = serde_json::from_value(serde_json::json!({
            "type": "message",
            "channel": "D1",
            "ts": "1.1",
            "event_ts": "1.1",
            "client_msg_id": "abc",
            "blocks": [],
        }))
        .unwrap();
        assert_eq!(event.event_type, "message");
    }
}
