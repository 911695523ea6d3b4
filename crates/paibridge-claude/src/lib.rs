// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent CLI subprocess invocation.
//!
//! Runs the agent CLI as a child process, streams its stdout for
//! heuristic progress-phase detection, and normalizes the final output
//! (ANSI stripping, bounded length). The child is deliberately given no
//! timeout: the queue exists to host long-running tasks, and a premature
//! kill would defeat that contract. Host-initiated signals are the only
//! way to stop a run.

use std::process::Stdio;
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use paibridge_core::BridgeError;

/// Progress phases recognized in streamed output, in priority order.
/// The first matching pattern in a chunk wins.
const PHASE_PATTERNS: [&str; 9] = [
    "OBSERVE",
    "THINK",
    "EXECUTE",
    "VERIFY",
    "COMPLETE",
    "Planning",
    "Implementing",
    "Testing",
    "Reviewing",
];

/// Suffix appended when the agent's output exceeds the configured bound.
const TRUNCATION_SUFFIX: &str = "\n\n... (output truncated)";

/// How to run the agent CLI.
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    /// Path to the agent CLI executable.
    pub cli_path: String,
    /// Working directory the child runs in.
    pub working_dir: String,
    /// Maximum characters of output returned.
    pub max_output_chars: usize,
}

/// Outcome of one agent invocation. `success == false` carries the
/// child's stderr (or an exit-code message) in `error`.
#[derive(Debug, Clone)]
pub struct InvokeResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub duration: Duration,
}

/// Invokes the agent CLI with `prompt` (and optional pre-rendered thread
/// context), streaming phase transitions into `progress` as they are
/// detected.
///
/// Spawn and pipe failures are `Err`; the child exiting non-zero is a
/// normal `Ok` result with `success == false`.
pub async fn invoke(
    prompt: &str,
    thread_context: Option<&str>,
    options: &InvokeOptions,
    progress: Option<mpsc::UnboundedSender<String>>,
) -> Result<InvokeResult, BridgeError> {
    let full_prompt = build_prompt(prompt, thread_context);
    let started = Instant::now();

    let mut child = Command::new(&options.cli_path)
        .arg("--print")
        .arg("--continue")
        .arg("--dangerously-skip-permissions")
        .arg(&full_prompt)
        .current_dir(&options.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BridgeError::Agent {
            message: format!("failed to spawn agent CLI `{}`: {e}", options.cli_path),
            source: Some(Box::new(e)),
        })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        BridgeError::Agent {
            message: "agent CLI stdout was not captured".into(),
            source: None,
        }
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        BridgeError::Agent {
            message: "agent CLI stderr was not captured".into(),
            source: None,
        }
    })?;

    // Drain stderr concurrently so a chatty child can't deadlock on a
    // full pipe while we read stdout.
    let stderr_task = tokio::spawn(async move {
        let mut buf = String::new();
        let mut reader = BufReader::new(stderr);
        let _ = reader.read_to_string(&mut buf).await;
        buf
    });

    let mut accumulated = String::new();
    let mut last_phase: Option<&'static str> = None;
    let mut reader = BufReader::new(stdout);
    let mut buf = [0u8; 4096];

    loop {
        let n = reader.read(&mut buf).await.map_err(|e| BridgeError::Agent {
            message: format!("failed to read agent CLI stdout: {e}"),
            source: Some(Box::new(e)),
        })?;
        if n == 0 {
            break;
        }
        let chunk = String::from_utf8_lossy(&buf[..n]);
        accumulated.push_str(&chunk);

        if let Some(phase) = detect_phase(&chunk) {
            if last_phase != Some(phase) {
                last_phase = Some(phase);
                debug!(phase, "agent phase transition");
                if let Some(tx) = &progress {
                    let _ = tx.send(phase.to_string());
                }
            }
        }
    }

    let status = child.wait().await.map_err(|e| BridgeError::Agent {
        message: format!("failed to wait for agent CLI: {e}"),
        source: Some(Box::new(e)),
    })?;
    let stderr_output = stderr_task.await.unwrap_or_default();
    let duration = started.elapsed();

    if !status.success() {
        let code = status.code().unwrap_or(-1);
        let error = if stderr_output.trim().is_empty() {
            format!("Claude CLI exited with code {code}")
        } else {
            stderr_output.trim().to_string()
        };
        warn!(code, duration_ms = duration.as_millis() as u64, "agent CLI failed");
        return Ok(InvokeResult {
            success: false,
            output: String::new(),
            error: Some(error),
            duration,
        });
    }

    let output = truncate_output(&strip_ansi(&accumulated), options.max_output_chars);
    Ok(InvokeResult {
        success: true,
        output,
        error: None,
        duration,
    })
}

/// Wraps the latest message with the fenced thread context, when present.
fn build_prompt(prompt: &str, thread_context: Option<&str>) -> String {
    match thread_context {
        Some(context) if !context.is_empty() => format!(
            "Here is the conversation thread for context:\n\n{context}\n\n---\n\nLatest message (respond to this):\n{prompt}"
        ),
        _ => prompt.to_string(),
    }
}

/// Scans a streamed chunk for a phase name, first pattern wins.
/// Matches anywhere in the chunk, case-insensitively; the caller latches
/// on the last reported phase so each distinct phase is reported once.
fn detect_phase(chunk: &str) -> Option<&'static str> {
    static REGEXES: std::sync::OnceLock<Vec<(Regex, &'static str)>> = std::sync::OnceLock::new();
    let regexes = REGEXES.get_or_init(|| {
        PHASE_PATTERNS
            .iter()
            .map(|phase| {
                let pattern = format!("(?i){phase}");
                (Regex::new(&pattern).expect("literal phase pattern"), *phase)
            })
            .collect()
    });

    regexes
        .iter()
        .find(|(regex, _)| regex.is_match(chunk))
        .map(|(_, phase)| *phase)
}

/// Removes ANSI escape sequences (two-byte escapes and CSI sequences).
fn strip_ansi(text: &str) -> String {
    static ANSI: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let ansi = ANSI.get_or_init(|| {
        Regex::new("\u{1b}(?:[@-Z\\\\-_]|\\[[0-?]*[ -/]*[@-~])").expect("literal ANSI pattern")
    });
    ansi.replace_all(text, "").into_owned()
}

/// Caps `text` at `max_chars`, replacing the tail with a truncation
/// marker so the total stays within the bound.
fn truncate_output(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(TRUNCATION_SUFFIX.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_SUFFIX);
    out
}
