// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority-key computation for the reactor queue.
//!
//! The key orders by workflow instance (sequence id) while preserving
//! arrival order within an instance. Expired tokens get no key and are
//! dropped before enqueue. Pure, no blocking.

use tf_core::Token;

/// Key assigned to a completed-join survivor when survivor preemption
/// is enabled; sorts ahead of every normal key.
pub const PREEMPT_KEY: u64 = 0;

/// Compute the queue priority for an arriving token. `None` is the
/// expired sentinel.
pub fn prioritise(token: &Token, arrival_ms: u64, now_ms: u64) -> Option<u64> {
    if token.is_expired(now_ms) {
        return None;
    }
    Some(token.sequence_id().0 * 1_000 + arrival_ms % 1_000)
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
