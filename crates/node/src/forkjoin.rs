// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Join-partner bookkeeping keyed by `(joinNode, parentSequenceId)`.
//!
//! Siblings are identified from sequence-id arithmetic alone. Each
//! ledger entry is guarded independently so unrelated joins do not
//! contend; the map lock is held only for entry lookup and removal.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tf_core::{SequenceId, Token};

/// What a registering worker learns about its join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinProgress {
    pub arrived: usize,
    pub required: usize,
    pub complete: bool,
}

/// One parked sibling: the decoded token plus its raw ingress text
/// (needed so the survivor can preserve `original_token`).
#[derive(Debug, Clone)]
pub struct JoinInput {
    pub token: Token,
    pub raw: String,
}

struct Entry {
    /// Parked siblings keyed by branch number.
    arrivals: HashMap<u64, JoinInput>,
    required: usize,
    /// Minimum deadline across participants.
    not_after: u64,
}

type Key = (String, SequenceId);

/// The node's join ledger.
#[derive(Default)]
pub struct ForkJoinRegistry {
    entries: RwLock<HashMap<Key, Arc<Mutex<Entry>>>>,
}

impl ForkJoinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sibling arrival. A re-delivered sibling replaces its
    /// earlier arrival rather than double-counting.
    pub fn register_arrival(
        &self,
        join_node: &str,
        token: Token,
        raw: String,
        required: usize,
    ) -> JoinProgress {
        let parent = token.sequence_id().parent();
        let branch = token.sequence_id().branch();
        let not_after = token.not_after();
        let key = (join_node.to_string(), parent);

        let entry = {
            let map = self.entries.read();
            map.get(&key).cloned()
        };
        let entry = match entry {
            Some(e) => e,
            None => {
                let mut map = self.entries.write();
                map.entry(key)
                    .or_insert_with(|| {
                        Arc::new(Mutex::new(Entry {
                            arrivals: HashMap::new(),
                            required,
                            not_after,
                        }))
                    })
                    .clone()
            }
        };

        let mut entry = entry.lock();
        entry.required = required;
        entry.not_after = entry.not_after.min(not_after);
        entry.arrivals.insert(branch, JoinInput { token, raw });
        JoinProgress {
            arrived: entry.arrivals.len(),
            required: entry.required,
            complete: entry.arrivals.len() >= entry.required,
        }
    }

    /// Atomically remove and return a completed arrival set, in branch
    /// order. One caller wins; later callers get `None`.
    pub fn take_completed(&self, join_node: &str, parent: SequenceId) -> Option<Vec<JoinInput>> {
        let key = (join_node.to_string(), parent);
        let mut map = self.entries.write();
        let complete = {
            let entry = map.get(&key)?;
            let entry = entry.lock();
            entry.arrivals.len() >= entry.required
        };
        if !complete {
            return None;
        }
        let entry = map.remove(&key)?;
        let entry = entry.lock();
        let mut inputs: Vec<(u64, JoinInput)> =
            entry.arrivals.iter().map(|(b, i)| (*b, i.clone())).collect();
        inputs.sort_by_key(|(branch, _)| *branch);
        Some(inputs.into_iter().map(|(_, i)| i).collect())
    }

    /// Whether a join for this parent is already in progress here. Used
    /// by the reactor to let late siblings bypass queue capacity.
    pub fn in_progress(&self, join_node: &str, parent: SequenceId) -> bool {
        self.entries.read().contains_key(&(join_node.to_string(), parent))
    }

    /// Remove entries whose minimum deadline has elapsed, returning the
    /// parked sibling ids per reaped entry.
    pub fn sweep_expired(&self, now_ms: u64) -> Vec<(String, SequenceId, Vec<SequenceId>)> {
        let mut map = self.entries.write();
        let expired: Vec<Key> = map
            .iter()
            .filter(|(_, entry)| entry.lock().not_after <= now_ms)
            .map(|(key, _)| key.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|key| {
                map.remove(&key).map(|entry| {
                    let entry = entry.lock();
                    let mut siblings: Vec<SequenceId> =
                        entry.arrivals.values().map(|i| i.token.sequence_id()).collect();
                    siblings.sort();
                    (key.0, key.1, siblings)
                })
            })
            .collect()
    }

    /// Number of in-flight join entries.
    pub fn pending(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
#[path = "forkjoin_tests.rs"]
mod tests;
