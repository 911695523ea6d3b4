// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for configuration loading, layering, and defaults.

use paibridge_config::{load_config_from_path, load_config_from_str, BridgeConfig};

#[test]
fn empty_config_uses_defaults() {
    let config = load_config_from_str("").unwrap();
    assert_eq!(config.bridge.log_level, "info");
    assert!(!config.bridge.debug);
    assert!(config.slack.bot_token.is_none());
    assert!(config.slack.allowed_users.is_empty());
    assert_eq!(config.claude.cli_path, "claude");
    assert_eq!(config.claude.max_output_chars, 4000);
    assert_eq!(config.queue.base_dir, "/tmp/pai-slack-queue");
    assert_eq!(config.queue.poll_interval_ms, 2000);
    assert_eq!(config.queue.thread_max_age_hours, 72);
}

#[test]
fn toml_values_override_defaults() {
    let config = load_config_from_str(
        r#"
[slack]
bot_token = "xoxb-abc"
app_token = "xapp-def"
allowed_users = ["U1", "U2"]
allowed_channels = ["C9"]

[claude]
cli_path = "/usr/local/bin/claude"
max_output_chars = 2000

[queue]
base_dir = "/var/lib/paibridge/queue"
poll_interval_ms = 500
"#,
    )
    .unwrap();

    assert_eq!(config.slack.bot_token.as_deref(), Some("xoxb-abc"));
    assert_eq!(config.slack.allowed_users, vec!["U1", "U2"]);
    assert_eq!(config.slack.allowed_channels, vec!["C9"]);
    assert_eq!(config.claude.cli_path, "/usr/local/bin/claude");
    assert_eq!(config.claude.max_output_chars, 2000);
    assert_eq!(config.queue.base_dir, "/var/lib/paibridge/queue");
    assert_eq!(config.queue.poll_interval_ms, 500);
    // Untouched sections keep their defaults.
    assert_eq!(config.queue.thread_max_age_hours, 72);
}

#[test]
fn unknown_keys_are_rejected() {
    let result = toml::from_str::<BridgeConfig>(
        r#"
[slack]
bot_tokne = "typo"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn unknown_section_is_rejected() {
    let result = toml::from_str::<BridgeConfig>(
        r#"
[telegram]
bot_token = "nope"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paibridge.toml");
    std::fs::write(
        &path,
        r#"
[bridge]
log_level = "debug"
debug = true
"#,
    )
    .unwrap();

    let config = load_config_from_path(&path).unwrap();
    assert_eq!(config.bridge.log_level, "debug");
    assert!(config.bridge.debug);
}

#[test]
fn thread_store_dir_defaults_under_base() {
    let config = load_config_from_str(
        r#"
[queue]
base_dir = "/tmp/pb-test-queue"
"#,
    )
    .unwrap();
    assert_eq!(
        config.queue.thread_store_dir(),
        std::path::PathBuf::from("/tmp/pb-test-queue/threads")
    );
}
