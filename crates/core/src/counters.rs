// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drop and error counters shared across a node.
//!
//! One counter per kind in the error taxonomy. Counters are the only
//! surfacing for silent drops, so every drop site increments exactly one.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Node-wide counters. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct Counters {
    malformed: AtomicU64,
    version_rejected: AtomicU64,
    expired: AtomicU64,
    queue_full: AtomicU64,
    guard_absorbed: AtomicU64,
    invocation_errors: AtomicU64,
    publish_failures: AtomicU64,
    chunk_timeouts: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn version_rejected(&self) {
        self.version_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn queue_full(&self) {
        self.queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn guard_absorbed(&self) {
        self.guard_absorbed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invocation_error(&self) {
        self.invocation_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chunk_timeout(&self) {
        self.chunk_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough snapshot for logging and tests.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            malformed: self.malformed.load(Ordering::Relaxed),
            version_rejected: self.version_rejected.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            guard_absorbed: self.guard_absorbed.load(Ordering::Relaxed),
            invocation_errors: self.invocation_errors.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            chunk_timeouts: self.chunk_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub malformed: u64,
    pub version_rejected: u64,
    pub expired: u64,
    pub queue_full: u64,
    pub guard_absorbed: u64,
    pub invocation_errors: u64,
    pub publish_failures: u64,
    pub chunk_timeouts: u64,
}

#[cfg(test)]
#[path = "counters_tests.rs"]
mod tests;
