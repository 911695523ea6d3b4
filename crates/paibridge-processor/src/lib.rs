// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The background processor.
//!
//! A single long-lived loop that drains the durable queue: claim a
//! pending job, run the agent CLI with streamed progress, post the result
//! back into the thread, record the assistant reply in the thread store,
//! and archive the job. Failures dead-letter into `failed/` and notify
//! the thread when routing is known.
//!
//! The processor is strictly serial. The agent CLI may mutate the local
//! filesystem, and its session-continuation flag assumes a single active
//! invocation, so exactly one job runs at a time and there is exactly one
//! processor per deployment.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use paibridge_claude::{invoke, InvokeOptions};
use paibridge_core::{
    BridgeError, ChatClient, Job, Notification, Role, ThreadMessage, BRIDGE_DISPLAY_NAME,
};
use paibridge_queue::JobQueue;
use paibridge_store::{truncate_at_natural_boundary, ThreadStore};

/// Thread store cleanup runs once per this many poll cycles.
const CLEANUP_EVERY_CYCLES: u64 = 100;

/// Assistant replies are truncated to this many characters before being
/// recorded in the thread store.
const ASSISTANT_SNIPPET_CHARS: usize = 500;

/// Processor settings, mapped from the bridge configuration at startup.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub cli_path: String,
    pub working_dir: String,
    pub max_output_chars: usize,
    pub poll_interval: Duration,
    pub thread_max_age_hours: u64,
}

/// The job processor. One instance per deployment.
pub struct Processor {
    queue: Arc<JobQueue>,
    store: Arc<ThreadStore>,
    chat: Arc<dyn ChatClient>,
    config: ProcessorConfig,
}

impl Processor {
    pub fn new(
        queue: Arc<JobQueue>,
        store: Arc<ThreadStore>,
        chat: Arc<dyn ChatClient>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            queue,
            store,
            chat,
            config,
        }
    }

    /// Runs the processor until `cancel` fires.
    ///
    /// Startup ensures the queue directories exist and requeues any job
    /// left in `processing/` by a crash (at-least-once redelivery).
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), BridgeError> {
        self.queue.ensure_dirs().await?;
        self.queue.recover().await?;
        info!(base = %self.queue.base().display(), "processor started");

        let mut cycles: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.queue.list_pending().await {
                Ok(files) => {
                    for file_name in files {
                        if cancel.is_cancelled() {
                            break;
                        }
                        self.process_one(&file_name).await;
                    }
                }
                Err(error) => {
                    // Self-heals on the next cycle once the directory is back.
                    warn!(%error, "failed to list pending queue directory");
                }
            }

            cycles += 1;
            if cycles % CLEANUP_EVERY_CYCLES == 0 {
                let deleted = self.store.cleanup(self.config.thread_max_age_hours).await;
                if deleted > 0 {
                    info!(deleted, "cleaned up stale thread transcripts");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!("processor stopped");
        Ok(())
    }

    /// Claims and fully processes one pending job file.
    pub async fn process_one(&self, file_name: &str) {
        if !self.queue.claim(file_name).await {
            return;
        }

        let parsed = match self.queue.read_processing(file_name).await {
            Ok(value) => value,
            Err(error) => {
                self.dead_letter(file_name, serde_json::json!({}), &error.to_string(), None, None)
                    .await;
                return;
            }
        };

        // A file with `text` and no `prompt` is a plain post request,
        // not an agent invocation.
        if parsed.get("text").is_some() && parsed.get("prompt").is_none() {
            self.handle_notification(file_name, parsed).await;
            return;
        }

        let job: Job = match serde_json::from_value(parsed.clone()) {
            Ok(job) => job,
            Err(error) => {
                let channel = parsed.get("channel").and_then(|v| v.as_str()).map(String::from);
                let thread_ts = parsed.get("thread_ts").and_then(|v| v.as_str()).map(String::from);
                self.dead_letter(
                    file_name,
                    parsed,
                    &format!("invalid job: {error}"),
                    channel.as_deref(),
                    thread_ts.as_deref(),
                )
                .await;
                return;
            }
        };

        self.handle_agent_job(file_name, job).await;
    }

    async fn handle_agent_job(&self, file_name: &str, mut job: Job) {
        info!(job_id = job.id.as_str(), channel = job.channel.as_str(), "processing job");
        job.started_at = Some(chrono::Utc::now().timestamp_millis());

        // Progress phases post as thread replies. Posting failures are
        // logged and swallowed so they can never abort the job.
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<String>();
        let chat = self.chat.clone();
        let (channel, thread_ts) = (job.channel.clone(), job.thread_ts.clone());
        let progress_task = tokio::spawn(async move {
            while let Some(phase) = progress_rx.recv().await {
                if let Err(error) = chat
                    .post_message(&channel, Some(&thread_ts), &format!("[{phase}]"))
                    .await
                {
                    warn!(%error, phase = phase.as_str(), "failed to post progress update");
                }
            }
        });

        let options = InvokeOptions {
            cli_path: self.config.cli_path.clone(),
            working_dir: self.config.working_dir.clone(),
            max_output_chars: self.config.max_output_chars,
        };
        let outcome = invoke(
            &job.prompt,
            job.thread_context.as_deref(),
            &options,
            Some(progress_tx),
        )
        .await;
        let _ = progress_task.await;

        let result = match outcome {
            Ok(result) => result,
            Err(error) => {
                let payload = serde_json::to_value(&job).unwrap_or_default();
                self.dead_letter(
                    file_name,
                    payload,
                    &error.to_string(),
                    Some(&job.channel),
                    Some(&job.thread_ts),
                )
                .await;
                return;
            }
        };

        if !result.success {
            let message = result.error.unwrap_or_else(|| "agent failed".to_string());
            let payload = serde_json::to_value(&job).unwrap_or_default();
            self.dead_letter(
                file_name,
                payload,
                &message,
                Some(&job.channel),
                Some(&job.thread_ts),
            )
            .await;
            return;
        }

        if let Err(error) = self
            .chat
            .post_message(&job.channel, Some(&job.thread_ts), &result.output)
            .await
        {
            let payload = serde_json::to_value(&job).unwrap_or_default();
            self.dead_letter(
                file_name,
                payload,
                &format!("failed to post result: {error}"),
                Some(&job.channel),
                Some(&job.thread_ts),
            )
            .await;
            return;
        }

        // Record the reply in the transcript. A store fault here is not a
        // job failure; the user already has the answer.
        let snippet = truncate_at_natural_boundary(&result.output, ASSISTANT_SNIPPET_CHARS);
        let assistant = ThreadMessage {
            role: Role::Assistant,
            name: BRIDGE_DISPLAY_NAME.to_string(),
            text: snippet,
            ts: chrono::Utc::now().timestamp().to_string(),
        };
        if let Err(error) = self.store.append(&job.thread_ts, &job.channel, assistant).await {
            warn!(%error, thread_ts = job.thread_ts.as_str(), "failed to record assistant reply");
        }

        job.completed_at = Some(chrono::Utc::now().timestamp_millis());
        if let Err(error) = self.queue.complete(file_name, &job).await {
            // The job stays in processing/ and will rerun after restart.
            error!(%error, file_name, "failed to archive completed job");
            return;
        }

        info!(
            job_id = job.id.as_str(),
            duration_ms = result.duration.as_millis() as u64,
            "job completed"
        );
    }

    async fn handle_notification(&self, file_name: &str, parsed: serde_json::Value) {
        let notice: Notification = match serde_json::from_value(parsed.clone()) {
            Ok(notice) => notice,
            Err(error) => {
                self.dead_letter(file_name, parsed, &format!("invalid notification: {error}"), None, None)
                    .await;
                return;
            }
        };

        debug!(channel = notice.channel.as_str(), "posting simple notification");
        if let Err(error) = self
            .chat
            .post_message(&notice.channel, notice.thread_ts.as_deref(), &notice.text)
            .await
        {
            self.dead_letter(
                file_name,
                parsed,
                &format!("failed to post notification: {error}"),
                None,
                None,
            )
            .await;
            return;
        }

        let mut record = parsed;
        record["completed_at"] = chrono::Utc::now().timestamp_millis().into();
        if let Err(error) = self.queue.complete(file_name, &record).await {
            error!(%error, file_name, "failed to archive notification");
        }
    }

    /// Moves the job into `failed/` and tells the thread when both
    /// `channel` and `thread_ts` are known. Notification failures are
    /// logged and swallowed.
    async fn dead_letter(
        &self,
        file_name: &str,
        mut payload: serde_json::Value,
        message: &str,
        channel: Option<&str>,
        thread_ts: Option<&str>,
    ) {
        warn!(file_name, error = message, "dead-lettering job");
        if !payload.is_object() {
            payload = serde_json::json!({});
        }
        payload["error"] = message.into();
        payload["failed_at"] = chrono::Utc::now().timestamp_millis().into();

        if let Err(error) = self.queue.fail(file_name, &payload).await {
            error!(%error, file_name, "failed to write dead-letter record");
        }

        if let (Some(channel), Some(thread_ts)) = (channel, thread_ts) {
            let apology =
                format!("Sorry, I encountered an error processing your request: {message}");
            if let Err(error) = self.chat.post_message(channel, Some(thread_ts), &apology).await {
                warn!(%error, "failed to post failure notification");
            }
        }
    }
}
