// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for paibridge integration tests.
//!
//! Provides a scripted [`MockChatClient`] for fast, deterministic,
//! CI-runnable tests without a live Slack workspace.

pub mod mock_chat;

pub use mock_chat::{MockChatClient, PostedMessage};
