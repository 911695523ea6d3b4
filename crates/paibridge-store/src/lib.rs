// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Thread transcript store for paibridge.
//!
//! Persists one JSON transcript file per chat thread with atomic writes
//! and per-thread FIFO serialization, seeds transcripts from the chat
//! platform's thread-history API, renders bounded prompt context with an
//! injection fence, and garbage-collects stale transcripts by age.

pub mod context;
pub mod store;

pub use context::{
    format_context, truncate_at_natural_boundary, DEFAULT_CONTEXT_BUDGET, INJECTION_FENCE,
};
pub use store::{ThreadStore, DEFAULT_MAX_AGE_HOURS};
