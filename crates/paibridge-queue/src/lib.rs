// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable on-disk work queue.
//!
//! Four sibling directories under a base path hold job files named
//! `<job_id>.json`; the directory a file resides in *is* the job's
//! lifecycle state:
//!
//! ```text
//! <base>/pending/      <base>/processing/
//! <base>/completed/    <base>/failed/
//! ```
//!
//! Submission and claim rely only on POSIX rename atomicity within one
//! filesystem; no locks are taken. `completed/` and `failed/` are
//! terminal and consumed by nothing but operators and [`JobQueue::status`].

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use paibridge_core::{BridgeError, Job, Notification, QueueStatus};

const PENDING: &str = "pending";
const PROCESSING: &str = "processing";
const COMPLETED: &str = "completed";
const FAILED: &str = "failed";

/// Handle on a queue base directory.
#[derive(Debug, Clone)]
pub struct JobQueue {
    base: PathBuf,
}

impl JobQueue {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Creates the four state directories if absent.
    pub async fn ensure_dirs(&self) -> Result<(), BridgeError> {
        for dir in [PENDING, PROCESSING, COMPLETED, FAILED] {
            let path = self.base.join(dir);
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|e| BridgeError::storage(format!("failed to create {}", path.display()), e))?;
        }
        Ok(())
    }

    /// Atomically submits a job into `pending/`.
    ///
    /// The job is serialized to `<base>/<id>.tmp.json` and renamed into
    /// place, so it never appears in `pending/` partially written.
    pub async fn submit(&self, job: &Job) -> Result<(), BridgeError> {
        self.submit_payload(&job.id, job).await
    }

    /// Submits a simple notification (plain post request) as a job file.
    /// Returns the generated or provided id.
    pub async fn submit_notification(&self, notice: &Notification) -> Result<String, BridgeError> {
        let id = notice
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut notice = notice.clone();
        notice.id = Some(id.clone());
        self.submit_payload(&id, &notice).await?;
        Ok(id)
    }

    async fn submit_payload<T: Serialize>(&self, id: &str, payload: &T) -> Result<(), BridgeError> {
        self.ensure_dirs().await?;

        let tmp = self.base.join(format!("{id}.tmp.json"));
        let target = self.base.join(PENDING).join(format!("{id}.json"));
        let json = serde_json::to_string_pretty(payload)
            .map_err(|e| BridgeError::Internal(format!("failed to serialize job {id}: {e}")))?;

        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| BridgeError::storage(format!("failed to write {}", tmp.display()), e))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| BridgeError::storage(format!("failed to rename {}", tmp.display()), e))?;

        debug!(job_id = id, "job submitted to pending");
        Ok(())
    }

    /// Lists `pending/` job file names in directory order. The queue
    /// promises eventual drain, not FIFO.
    pub async fn list_pending(&self) -> Result<Vec<String>, BridgeError> {
        let dir = self.base.join(PENDING);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| BridgeError::storage(format!("failed to list {}", dir.display()), e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BridgeError::storage(format!("failed to read {}", dir.display()), e))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".json") {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Claims a pending job by renaming it into `processing/`.
    ///
    /// Returns `false` when the rename fails because another worker
    /// moved or deleted the file first. A lost race is never fatal.
    pub async fn claim(&self, file_name: &str) -> bool {
        let from = self.base.join(PENDING).join(file_name);
        let to = self.base.join(PROCESSING).join(file_name);
        match tokio::fs::rename(&from, &to).await {
            Ok(()) => true,
            Err(error) => {
                debug!(file_name, %error, "lost claim race, skipping");
                false
            }
        }
    }

    /// Reads and parses a claimed job file from `processing/`.
    pub async fn read_processing(&self, file_name: &str) -> Result<serde_json::Value, BridgeError> {
        let path = self.base.join(PROCESSING).join(file_name);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| BridgeError::storage(format!("failed to read {}", path.display()), e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BridgeError::InvalidJob(format!("{file_name}: {e}")))
    }

    /// Moves a job to the `completed/` terminal state: writes the final
    /// payload over `processing/<f>`, then renames into `completed/`.
    pub async fn complete<T: Serialize>(
        &self,
        file_name: &str,
        payload: &T,
    ) -> Result<(), BridgeError> {
        let from = self.base.join(PROCESSING).join(file_name);
        let to = self.base.join(COMPLETED).join(file_name);
        let json = serde_json::to_string_pretty(payload)
            .map_err(|e| BridgeError::Internal(format!("failed to serialize {file_name}: {e}")))?;

        tokio::fs::write(&from, json.as_bytes())
            .await
            .map_err(|e| BridgeError::storage(format!("failed to write {}", from.display()), e))?;
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| BridgeError::storage(format!("failed to rename {}", from.display()), e))?;
        Ok(())
    }

    /// Moves a job to the `failed/` dead-letter state: writes the payload
    /// into `failed/<f>` and unlinks `processing/<f>`.
    pub async fn fail<T: Serialize>(&self, file_name: &str, payload: &T) -> Result<(), BridgeError> {
        let dead = self.base.join(FAILED).join(file_name);
        let json = serde_json::to_string_pretty(payload)
            .map_err(|e| BridgeError::Internal(format!("failed to serialize {file_name}: {e}")))?;

        tokio::fs::write(&dead, json.as_bytes())
            .await
            .map_err(|e| BridgeError::storage(format!("failed to write {}", dead.display()), e))?;

        let claimed = self.base.join(PROCESSING).join(file_name);
        if let Err(error) = tokio::fs::remove_file(&claimed).await {
            warn!(file_name, %error, "failed to unlink dead-lettered job from processing");
        }
        Ok(())
    }

    /// Crash recovery: moves every `processing/*.json` back to `pending/`.
    ///
    /// A job interrupted mid-execution is retried at least once;
    /// idempotence of the retry is not guaranteed. Returns the number of
    /// jobs recovered. Repeated calls on an empty `processing/` are no-ops.
    pub async fn recover(&self) -> Result<usize, BridgeError> {
        let dir = self.base.join(PROCESSING);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| BridgeError::storage(format!("failed to list {}", dir.display()), e))?;

        let mut recovered = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BridgeError::storage(format!("failed to read {}", dir.display()), e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(".json") {
                continue;
            }
            let target = self.base.join(PENDING).join(name);
            match tokio::fs::rename(entry.path(), &target).await {
                Ok(()) => recovered += 1,
                Err(error) => warn!(file_name = name, %error, "failed to recover stuck job"),
            }
        }

        if recovered > 0 {
            info!(recovered, "requeued jobs found in processing at startup");
        }
        Ok(recovered)
    }

    /// Counts `*.json` entries in each state directory. Missing
    /// directories count as zero.
    pub async fn status(&self) -> QueueStatus {
        QueueStatus {
            pending: self.count_dir(PENDING).await,
            processing: self.count_dir(PROCESSING).await,
            completed: self.count_dir(COMPLETED).await,
            failed: self.count_dir(FAILED).await,
        }
    }

    async fn count_dir(&self, state: &str) -> usize {
        let dir = self.base.join(state);
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            return 0;
        };
        let mut count = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.ends_with(".json"))
            {
                count += 1;
            }
        }
        count
    }
}
