// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for external collaborators the core consumes.

pub mod chat;

pub use chat::ChatClient;
