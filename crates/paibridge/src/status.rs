// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `paibridge status` command implementation.

use paibridge_config::BridgeConfig;
use paibridge_core::BridgeError;
use paibridge_queue::JobQueue;

/// Prints the queue status snapshot for the configured base directory.
pub async fn run_status(config: BridgeConfig) -> Result<(), BridgeError> {
    let queue = JobQueue::new(&config.queue.base_dir);
    let status = queue.status().await;

    println!("queue: {}", config.queue.base_dir);
    println!("  pending:    {}", status.pending);
    println!("  processing: {}", status.processing);
    println!("  completed:  {}", status.completed);
    println!("  failed:     {}", status.failed);
    Ok(())
}
