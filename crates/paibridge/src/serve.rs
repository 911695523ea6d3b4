// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `paibridge serve` command implementation.
//!
//! Wires the Slack client, thread store, durable queue, intake, and the
//! background processor together, then runs until SIGINT/SIGTERM. Intake
//! handles events concurrently; the processor stays strictly serial.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use paibridge_config::{validate_for_serve, BridgeConfig};
use paibridge_core::{BridgeError, ChatClient};
use paibridge_processor::{Processor, ProcessorConfig};
use paibridge_queue::JobQueue;
use paibridge_slack::{run_socket_mode, Intake, SlackClient};
use paibridge_store::ThreadStore;

/// Runs the `paibridge serve` command.
pub async fn run_serve(config: BridgeConfig) -> Result<(), BridgeError> {
    init_tracing(&config.bridge.log_level, config.bridge.debug);

    if let Err(errors) = validate_for_serve(&config) {
        for error in &errors {
            eprintln!("error: {error}");
        }
        return Err(BridgeError::Config(format!(
            "{} configuration error(s), cannot start",
            errors.len()
        )));
    }

    info!("starting paibridge serve");

    // Tokens are validated present above.
    let bot_token = config.slack.bot_token.clone().unwrap_or_default();
    let app_token = config.slack.app_token.clone().unwrap_or_default();
    let slack = Arc::new(SlackClient::new(bot_token, app_token)?);
    slack.connect().await?;
    info!(bot_user_id = slack.bot_user_id(), "connected to Slack");

    let store = Arc::new(ThreadStore::new(config.queue.thread_store_dir()));
    let queue = Arc::new(JobQueue::new(&config.queue.base_dir));
    let chat: Arc<dyn ChatClient> = slack.clone();

    let cancel = install_signal_handler();

    // Background processor: one per deployment, strictly serial.
    let processor = Processor::new(
        queue.clone(),
        store.clone(),
        chat.clone(),
        ProcessorConfig {
            cli_path: config.claude.cli_path.clone(),
            working_dir: config.claude.working_dir.clone(),
            max_output_chars: config.claude.max_output_chars,
            poll_interval: Duration::from_millis(config.queue.poll_interval_ms),
            thread_max_age_hours: config.queue.thread_max_age_hours,
        },
    );
    let processor_cancel = cancel.clone();
    let processor_task = tokio::spawn(async move {
        if let Err(e) = processor.run(processor_cancel).await {
            error!(error = %e, "processor exited with error");
        }
    });

    // Socket Mode transport feeding the intake path.
    let (events_tx, mut events_rx) = mpsc::channel(100);
    let socket_task = tokio::spawn(run_socket_mode(slack.clone(), events_tx, cancel.clone()));

    let intake = Arc::new(Intake::new(
        chat,
        store,
        queue,
        config.slack.allowed_users.clone(),
        config.slack.allowed_channels.clone(),
    ));

    info!("paibridge running");
    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Some(event) => {
                        // Events are independent; handle them concurrently.
                        let intake = intake.clone();
                        tokio::spawn(async move { intake.handle_event(event).await });
                    }
                    None => {
                        warn!("event channel closed");
                        break;
                    }
                }
            }
            _ = cancel.cancelled() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    cancel.cancel();
    let _ = socket_task.await;
    let _ = processor_task.await;

    info!("paibridge serve shutdown complete");
    Ok(())
}

/// Installs handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] cancelled when either signal arrives.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT, initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(error) => {
                    warn!(%error, "failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    info!("received SIGINT, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
    });

    token
}

/// Initializes the tracing subscriber with the configured log level.
fn init_tracing(log_level: &str, debug: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if debug { "debug" } else { log_level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("paibridge={level},warn")));

    // Ignore a second init in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
