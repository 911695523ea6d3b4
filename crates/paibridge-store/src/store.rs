// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-thread transcript persistence on the local filesystem.
//!
//! Each thread is one JSON file named `<thread_ts>.json`. Writes go
//! through a temp-file-then-rename protocol so readers only ever observe
//! a complete snapshot, and all writes for a given thread are funnelled
//! through an in-process FIFO lock. Multi-process safety is out of scope.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use paibridge_core::{
    BridgeError, ChatClient, Role, ThreadFile, ThreadMessage, BRIDGE_DISPLAY_NAME,
};

/// An appended message is dropped if its `ts` already appears among this
/// many most-recent stored entries.
const DEDUP_WINDOW: usize = 5;

/// How many thread messages to fetch when seeding from the platform.
const SEED_REPLY_LIMIT: u32 = 20;

/// Transcripts older than this many hours are garbage-collected.
pub const DEFAULT_MAX_AGE_HOURS: u64 = 72;

/// Filesystem-backed store of per-thread transcripts.
pub struct ThreadStore {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ThreadStore {
    /// Creates a store rooted at `dir`. The directory is created lazily on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The directory transcripts are stored in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads the transcript for `thread_ts`, or `None` if the file is
    /// absent or unreadable (best-effort read).
    pub async fn load(&self, thread_ts: &str) -> Option<ThreadFile> {
        let path = self.file_path(thread_ts);
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(file) => Some(file),
            Err(error) => {
                warn!(thread_ts, %error, "unparseable thread file, treating as absent");
                None
            }
        }
    }

    /// Persists `file` atomically: serialize to `<thread_ts>.tmp.json`,
    /// then rename over `<thread_ts>.json`. Readers see either the prior
    /// snapshot or the new one, never a torn write.
    pub async fn save(&self, file: &ThreadFile) -> Result<(), BridgeError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| BridgeError::storage("failed to create thread store directory", e))?;

        let tmp = self.dir.join(format!("{}.tmp.json", file.thread_ts));
        let path = self.file_path(&file.thread_ts);
        let json = serde_json::to_string_pretty(file)
            .map_err(|e| BridgeError::Internal(format!("failed to serialize thread file: {e}")))?;

        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| BridgeError::storage(format!("failed to write {}", tmp.display()), e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| BridgeError::storage(format!("failed to rename {}", tmp.display()), e))?;
        Ok(())
    }

    /// Appends `msg` to the transcript for `thread_ts`, creating it if
    /// absent. Serialized per thread; a message whose `ts` appears within
    /// the last [`DEDUP_WINDOW`] stored entries is a no-op. Maintains
    /// `message_count == messages.len()`. Returns the post-append file.
    pub async fn append(
        &self,
        thread_ts: &str,
        channel: &str,
        msg: ThreadMessage,
    ) -> Result<ThreadFile, BridgeError> {
        let lock = self.lock_for(thread_ts).await;
        let _guard = lock.lock().await;

        let mut file = self
            .load(thread_ts)
            .await
            .unwrap_or_else(|| ThreadFile::new(thread_ts, channel));

        let window_start = file.messages.len().saturating_sub(DEDUP_WINDOW);
        if file.messages[window_start..].iter().any(|m| m.ts == msg.ts) {
            debug!(thread_ts, ts = msg.ts.as_str(), "duplicate message ts, skipping append");
            return Ok(file);
        }

        file.messages.push(msg);
        file.message_count = file.messages.len();
        self.save(&file).await?;
        Ok(file)
    }

    /// Seeds a transcript from the platform's thread-history API.
    ///
    /// Fetches up to [`SEED_REPLY_LIMIT`] messages (root inclusive) and
    /// classifies each one:
    /// - no text: dropped,
    /// - authored by the bridge itself: `assistant` as `pai-slack-bridge`,
    /// - authored by any other bot: dropped,
    /// - authored by a user: `user` with the resolved display name
    ///   (name lookups cached per call; unknown users recorded by id),
    /// - no author at all: dropped.
    ///
    /// Overwrites prior on-disk state for the thread.
    pub async fn seed_from_platform(
        &self,
        thread_ts: &str,
        channel: &str,
        bridge_bot_id: &str,
        chat: &dyn ChatClient,
    ) -> Result<ThreadFile, BridgeError> {
        let replies = chat.list_replies(channel, thread_ts, SEED_REPLY_LIMIT).await?;

        let mut name_cache: HashMap<String, String> = HashMap::new();
        let mut file = ThreadFile::new(thread_ts, channel);

        for reply in replies {
            let text = match reply.text.as_deref() {
                Some(text) if !text.is_empty() => text.to_string(),
                _ => continue,
            };

            if reply.user.as_deref() == Some(bridge_bot_id) {
                file.messages.push(ThreadMessage {
                    role: Role::Assistant,
                    name: BRIDGE_DISPLAY_NAME.to_string(),
                    text,
                    ts: reply.ts,
                });
                continue;
            }

            // A bot_id from anyone but the bridge itself means another
            // bot's message; those never enter the transcript.
            if reply.bot_id.is_some() {
                continue;
            }

            let Some(user_id) = reply.user else {
                continue;
            };

            let name = match name_cache.get(&user_id) {
                Some(name) => name.clone(),
                None => {
                    // Best-effort resolution: an unreachable user-info
                    // endpoint leaves the raw id as the name.
                    let name = match chat.describe_user(&user_id).await {
                        Ok(profile) => profile.best_name(&user_id),
                        Err(error) => {
                            debug!(user_id = user_id.as_str(), %error, "user lookup failed");
                            user_id.clone()
                        }
                    };
                    name_cache.insert(user_id.clone(), name.clone());
                    name
                }
            };

            file.messages.push(ThreadMessage {
                role: Role::User,
                name,
                text,
                ts: reply.ts,
            });
        }

        file.message_count = file.messages.len();

        let lock = self.lock_for(thread_ts).await;
        let _guard = lock.lock().await;
        self.save(&file).await?;
        Ok(file)
    }

    /// Deletes transcripts whose file mtime is older than `max_age_hours`,
    /// dropping their lock entries. Per-file errors are swallowed (a file
    /// may be racing with a writer). Returns the number deleted.
    pub async fn cleanup(&self, max_age_hours: u64) -> usize {
        let cutoff = SystemTime::now() - Duration::from_secs(max_age_hours * 3600);
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let mut deleted = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(".json") || name.ends_with(".tmp.json") {
                continue;
            }

            let Ok(meta) = entry.metadata().await else { continue };
            let Ok(mtime) = meta.modified() else { continue };
            if mtime >= cutoff {
                continue;
            }

            if tokio::fs::remove_file(entry.path()).await.is_ok() {
                let thread_ts = name.trim_end_matches(".json");
                self.locks.lock().await.remove(thread_ts);
                deleted += 1;
            }
        }

        if deleted > 0 {
            debug!(deleted, "thread store cleanup removed stale transcripts");
        }
        deleted
    }

    /// Runs `op` while holding the thread's FIFO lock.
    ///
    /// Write operations already lock internally; this is for callers that
    /// need a larger critical section across one thread's state.
    pub async fn with_thread_lock<T, Fut>(&self, thread_ts: &str, op: impl FnOnce() -> Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        let lock = self.lock_for(thread_ts).await;
        let _guard = lock.lock().await;
        op().await
    }

    fn file_path(&self, thread_ts: &str) -> PathBuf {
        self.dir.join(format!("{thread_ts}.json"))
    }

    /// Fetches or creates the per-thread lock. The map itself is guarded;
    /// the per-thread critical section is not held here.
    async fn lock_for(&self, thread_ts: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(thread_ts.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
