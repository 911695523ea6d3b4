// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the paibridge workspace.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Display name the bridge uses for its own messages in thread transcripts.
pub const BRIDGE_DISPLAY_NAME: &str = "pai-slack-bridge";

/// Speaker role of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One utterance in a thread transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// Who spoke: `user` or `assistant`.
    pub role: Role,
    /// Human display name of the speaker.
    pub name: String,
    /// Utterance body.
    pub text: String,
    /// Monotone-ordered timestamp string from the chat platform.
    /// Acts as the dedup key within the recent-message window.
    pub ts: String,
}

/// The durable transcript for one chat thread.
///
/// Persisted as `<thread_ts>.json` in the thread store directory. The file
/// on disk is always either fully written or absent (atomic rename writes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadFile {
    /// Timestamp of the thread's root message; primary key and filename stem.
    pub thread_ts: String,
    /// Channel the thread lives in.
    pub channel: String,
    /// Always equals `messages.len()` after an append.
    pub message_count: usize,
    /// Messages in order of appearance in the thread.
    pub messages: Vec<ThreadMessage>,
    /// Free-form compaction placeholder. Stored if present, never synthesized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Operational flag; preserved but not interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reseeded: Option<bool>,
}

impl ThreadFile {
    /// Creates an empty transcript for a thread.
    pub fn new(thread_ts: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            thread_ts: thread_ts.into(),
            channel: channel.into(),
            message_count: 0,
            messages: Vec::new(),
            summary: None,
            reseeded: None,
        }
    }
}

/// One unit of agent work, persisted as `<id>.json` in a queue directory.
///
/// The directory a job file resides in *is* its lifecycle state; no field
/// in the file is authoritative for state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque unique identifier (UUID v4).
    pub id: String,
    /// Channel to post the result into.
    pub channel: String,
    /// Thread to reply in.
    pub thread_ts: String,
    /// Chat user id of the requester.
    pub user: String,
    /// Latest user utterance, cleaned of bot-mention syntax.
    pub prompt: String,
    /// Pre-rendered, fenced transcript string, when the thread has history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_context: Option<String>,
    /// Epoch-millisecond submission timestamp. Defaults to zero when a
    /// hand-written job file omits it; validation requires only
    /// `{id, channel, thread_ts, user, prompt}`.
    #[serde(default)]
    pub created_at: i64,
    /// Set when the processor claims the job. Serialized as `null` until
    /// the transition occurs.
    #[serde(default)]
    pub started_at: Option<i64>,
    /// Set when the job reaches the completed state.
    #[serde(default)]
    pub completed_at: Option<i64>,
    /// Populated only in the failed terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<i64>,
}

impl Job {
    /// Builds a new job with a generated id and submission timestamp.
    pub fn new(
        channel: impl Into<String>,
        thread_ts: impl Into<String>,
        user: impl Into<String>,
        prompt: impl Into<String>,
        thread_context: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel: channel.into(),
            thread_ts: thread_ts.into(),
            user: user.into(),
            prompt: prompt.into(),
            thread_context,
            created_at: chrono::Utc::now().timestamp_millis(),
            started_at: None,
            completed_at: None,
            error: None,
            failed_at: None,
        }
    }
}

/// A plain post request queued as a job file.
///
/// Distinguished from [`Job`] solely by carrying `text` and no `prompt`.
/// The processor posts `text` to `channel` without invoking the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    pub text: String,
}

/// Snapshot of job counts per queue directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// A message as returned by the chat platform's thread-history API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Profile fields from the chat platform's user-info API. Any may be missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserProfile {
    /// Picks the best available human name, falling back to the raw user id.
    pub fn best_name(&self, user_id: &str) -> String {
        [&self.display_name, &self.real_name, &self.name]
            .into_iter()
            .flatten()
            .find(|n| !n.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| user_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_renders_lowercase() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
    }

    #[test]
    fn thread_file_round_trips() {
        let mut file = ThreadFile::new("1234.5678", "C123");
        file.messages.push(ThreadMessage {
            role: Role::User,
            name: "alice".into(),
            text: "hi".into(),
            ts: "1234.5679".into(),
        });
        file.message_count = 1;

        let json = serde_json::to_string_pretty(&file).unwrap();
        let parsed: ThreadFile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, file);
        // Optional fields absent from the file should stay absent.
        assert!(!json.contains("summary"));
        assert!(!json.contains("reseeded"));
    }

    #[test]
    fn job_new_populates_id_and_created_at() {
        let job = Job::new("C1", "1.2", "U1", "do the thing", None);
        assert_eq!(job.id.len(), 36);
        assert!(job.created_at > 0);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn job_missing_prompt_fails_to_parse() {
        let raw = r#"{"id":"a","channel":"C1","thread_ts":"1.2","user":"U1","created_at":0,"started_at":null,"completed_at":null}"#;
        let err = serde_json::from_str::<Job>(raw).unwrap_err();
        assert!(err.to_string().contains("prompt"));
    }

    #[test]
    fn job_parses_with_only_the_required_fields() {
        let raw = r#"{"id":"a","channel":"C1","thread_ts":"1.2","user":"U1","prompt":"go"}"#;
        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job.prompt, "go");
        assert_eq!(job.created_at, 0);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn notification_is_distinguished_by_text_without_prompt() {
        let raw = r#"{"channel":"C1","text":"heads up"}"#;
        let value: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert!(value.get("text").is_some() && value.get("prompt").is_none());
        let notice: Notification = serde_json::from_value(value).unwrap();
        assert_eq!(notice.text, "heads up");
    }

    #[test]
    fn best_name_prefers_display_then_real_then_name() {
        let profile = UserProfile {
            display_name: Some("Ada".into()),
            real_name: Some("Ada Lovelace".into()),
            name: Some("ada".into()),
        };
        assert_eq!(profile.best_name("U1"), "Ada");

        let profile = UserProfile {
            display_name: Some("  ".into()),
            real_name: None,
            name: Some("ada".into()),
        };
        assert_eq!(profile.best_name("U1"), "ada");

        assert_eq!(UserProfile::default().best_name("U1"), "U1");
    }
}
