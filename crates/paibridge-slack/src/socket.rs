// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket Mode transport.
//!
//! Opens a Socket Mode websocket via `apps.connections.open`, acks every
//! `events_api` envelope by id before dispatching its event, and
//! reconnects with a short delay whenever Slack drops the connection.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::event::SlackEvent;
use crate::SlackClient;

/// Delay before dialing again after a dropped or failed connection.
const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// One Socket Mode frame from Slack.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<EnvelopePayload>,
}

#[derive(Debug, Deserialize)]
struct EnvelopePayload {
    #[serde(default)]
    event: Option<serde_json::Value>,
}

/// Runs the Socket Mode loop until `cancel` fires, forwarding DM and
/// mention events into `events_tx`.
pub async fn run_socket_mode(
    client: Arc<SlackClient>,
    events_tx: mpsc::Sender<SlackEvent>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        let url = match client.open_socket_url().await {
            Ok(url) => url,
            Err(error) => {
                warn!(%error, "failed to open Socket Mode connection");
                if wait_or_cancelled(&cancel).await {
                    break;
                }
                continue;
            }
        };

        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                info!("Socket Mode connected");
                run_connection(stream, &events_tx, &cancel).await;
            }
            Err(error) => {
                warn!(%error, "Socket Mode websocket connect failed");
            }
        }

        if cancel.is_cancelled() {
            break;
        }
        if wait_or_cancelled(&cancel).await {
            break;
        }
        info!("reconnecting Socket Mode");
    }

    info!("Socket Mode loop stopped");
}

/// Sleeps the reconnect delay; returns true when cancelled instead.
async fn wait_or_cancelled(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(RECONNECT_DELAY) => false,
        _ = cancel.cancelled() => true,
    }
}

/// Drives one websocket connection until it closes or `cancel` fires.
async fn run_connection<S>(
    stream: tokio_tungstenite::WebSocketStream<S>,
    events_tx: &mpsc::Sender<SlackEvent>,
    cancel: &CancellationToken,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = stream.split();

    loop {
        let message = tokio::select! {
            message = read.next() => message,
            _ = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return;
            }
        };

        let message = match message {
            Some(Ok(message)) => message,
            Some(Err(error)) => {
                warn!(%error, "Socket Mode read error");
                return;
            }
            None => {
                debug!("Socket Mode stream ended");
                return;
            }
        };

        match message {
            Message::Text(text) => {
                let envelope: Envelope = match serde_json::from_str(&text) {
                    Ok(envelope) => envelope,
                    Err(error) => {
                        debug!(%error, "ignoring unparseable Socket Mode frame");
                        continue;
                    }
                };

                // Ack before doing any work: Slack redelivers unacked
                // envelopes, and the durable queue owns reliability from
                // here on.
                if let Some(envelope_id) = &envelope.envelope_id {
                    let ack = serde_json::json!({ "envelope_id": envelope_id }).to_string();
                    if let Err(error) = write.send(Message::Text(ack)).await {
                        warn!(%error, "failed to ack Socket Mode envelope");
                        return;
                    }
                }

                match envelope.envelope_type.as_str() {
                    "hello" => debug!("Socket Mode hello received"),
                    "disconnect" => {
                        info!("Socket Mode disconnect requested by Slack");
                        return;
                    }
                    "events_api" => {
                        let Some(event_value) =
                            envelope.payload.and_then(|payload| payload.event)
                        else {
                            continue;
                        };
                        dispatch_event(event_value, events_tx).await;
                    }
                    other => debug!(envelope_type = other, "ignoring Socket Mode envelope"),
                }
            }
            Message::Ping(payload) => {
                if write.send(Message::Pong(payload)).await.is_err() {
                    return;
                }
            }
            Message::Close(_) => {
                debug!("Socket Mode close frame received");
                return;
            }
            _ => {}
        }
    }
}

/// Forwards `message` and `app_mention` events; everything else drops here.
async fn dispatch_event(event_value: serde_json::Value, events_tx: &mpsc::Sender<SlackEvent>) {
    let event_type = event_value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    if event_type != "message" && event_type != "app_mention" {
        debug!(event_type, "ignoring event type");
        return;
    }

    match serde_json::from_value::<SlackEvent>(event_value) {
        Ok(event) => {
            if events_tx.send(event).await.is_err() {
                warn!("event channel closed, dropping event");
            }
        }
        Err(error) => debug!(%error, "ignoring unparseable event"),
    }
}
