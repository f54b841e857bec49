// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Observability events for the token lifecycle.
//!
//! Events are a pure observer channel: they feed logging and counters
//! and never gate routing. Serializes with `{"type": "event:name", ...}`
//! format.

use crate::seq::SequenceId;
use serde::{Deserialize, Serialize};

/// Events emitted as tokens move through a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- admission --
    #[serde(rename = "token:admitted")]
    TokenAdmitted { sequence_id: SequenceId, service: String, operation: String },

    #[serde(rename = "token:expired")]
    TokenExpired { sequence_id: SequenceId, not_after: u64, now: u64 },

    #[serde(rename = "token:malformed")]
    TokenMalformed { reason: String },

    /// Rule-base version not committed at this node.
    #[serde(rename = "token:version-rejected")]
    VersionRejected { sequence_id: SequenceId, version: String },

    /// Target service mismatch. A normal filter, not an error.
    #[serde(rename = "token:filtered")]
    TokenFiltered { sequence_id: SequenceId, service: String },

    #[serde(rename = "queue:full")]
    QueueFull { sequence_id: SequenceId, capacity: usize },

    // -- join --
    #[serde(rename = "join:registered")]
    JoinRegistered {
        join_node: String,
        parent: SequenceId,
        sibling: SequenceId,
        arrived: usize,
        required: usize,
    },

    #[serde(rename = "join:completed")]
    JoinCompleted {
        join_node: String,
        parent: SequenceId,
        survivor: SequenceId,
        consumed: Vec<SequenceId>,
    },

    /// A partial join whose deadline elapsed; all parked siblings expire.
    #[serde(rename = "join:expired")]
    JoinExpired { join_node: String, parent: SequenceId, siblings: Vec<SequenceId> },

    // -- guard / invoke --
    /// Guard returned false with no retry edge; the token is absorbed.
    #[serde(rename = "guard:absorbed")]
    GuardAbsorbed { sequence_id: SequenceId, operation: String },

    #[serde(rename = "guard:retry")]
    GuardRetry { sequence_id: SequenceId, operation: String },

    #[serde(rename = "invoke:completed")]
    Invoked { sequence_id: SequenceId, operation: String, elapsed_ms: u64 },

    /// Business failure became a synthetic error token and kept routing.
    #[serde(rename = "invoke:failed")]
    InvocationFailed { sequence_id: SequenceId, operation: String, error: String },

    // -- publish --
    #[serde(rename = "publish:sent")]
    TokenPublished { sequence_id: SequenceId, service: String, operation: String, channel: String },

    #[serde(rename = "publish:failed")]
    PublishFailed { sequence_id: SequenceId, channel: String, reason: String },

    /// Empty route set: the token reached a terminate node.
    #[serde(rename = "token:terminated")]
    TokenTerminated { sequence_id: SequenceId },

    // -- transport --
    #[serde(rename = "chunk:expired")]
    ChunkSetExpired { correlation_id: String, received: usize, total: usize },

    // -- rules --
    #[serde(rename = "rules:committed")]
    RuleBaseCommitted { version: String, operations: usize },
}

impl Event {
    /// Monitor-class events are suppressed for admin-version tokens;
    /// drop and error events always flow.
    pub fn is_monitor_class(&self) -> bool {
        matches!(
            self,
            Event::TokenAdmitted { .. }
                | Event::JoinRegistered { .. }
                | Event::JoinCompleted { .. }
                | Event::Invoked { .. }
                | Event::TokenPublished { .. }
                | Event::TokenTerminated { .. }
        )
    }

    /// Short human-readable summary for activity logs.
    pub fn summary(&self) -> String {
        match self {
            Event::TokenAdmitted { sequence_id, operation, .. } => {
                format!("admitted {sequence_id} op={operation}")
            }
            Event::TokenExpired { sequence_id, not_after, now } => {
                format!("expired {sequence_id} not_after={not_after} now={now}")
            }
            Event::TokenMalformed { reason } => format!("malformed: {reason}"),
            Event::VersionRejected { sequence_id, version } => {
                format!("version {version} rejected for {sequence_id}")
            }
            Event::TokenFiltered { sequence_id, service } => {
                format!("filtered {sequence_id} (targets {service})")
            }
            Event::QueueFull { sequence_id, capacity } => {
                format!("queue full ({capacity}), dropped {sequence_id}")
            }
            Event::JoinRegistered { parent, arrived, required, .. } => {
                format!("join {parent} {arrived}/{required}")
            }
            Event::JoinCompleted { parent, consumed, .. } => {
                format!("join {parent} completed, {} consumed", consumed.len())
            }
            Event::JoinExpired { parent, siblings, .. } => {
                format!("join {parent} expired with {} parked", siblings.len())
            }
            Event::GuardAbsorbed { sequence_id, operation } => {
                format!("guard absorbed {sequence_id} op={operation}")
            }
            Event::GuardRetry { sequence_id, operation } => {
                format!("guard retry {sequence_id} op={operation}")
            }
            Event::Invoked { sequence_id, elapsed_ms, .. } => {
                format!("invoked {sequence_id} in {elapsed_ms}ms")
            }
            Event::InvocationFailed { sequence_id, error, .. } => {
                format!("invoke failed {sequence_id}: {error}")
            }
            Event::TokenPublished { sequence_id, service, channel, .. } => {
                format!("published {sequence_id} to {service} via {channel}")
            }
            Event::PublishFailed { sequence_id, channel, reason } => {
                format!("publish failed {sequence_id} via {channel}: {reason}")
            }
            Event::TokenTerminated { sequence_id } => format!("terminated {sequence_id}"),
            Event::ChunkSetExpired { correlation_id, received, total } => {
                format!("chunk set {correlation_id} expired at {received}/{total}")
            }
            Event::RuleBaseCommitted { version, operations } => {
                format!("rule base {version} committed ({operations} operations)")
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
