// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rule bundle: the operation-scoped guard and routing rules installed
//! at a node for one rule-base version.

use serde::{Deserialize, Serialize};

/// T_in guard: a predicate over the token's join attribute or payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardRule {
    /// Field inspected: the join-attribute name or a payload field.
    pub field: String,
    /// Required value, compared as a string.
    pub equals: String,
    /// When true, a failed guard re-admits the token instead of
    /// absorbing it (a retry edge back to this place).
    #[serde(default)]
    pub retry: bool,
}

/// One T_out routing target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTarget {
    pub service: String,
    pub operation: String,
    /// Logical channel id, resolved by the publisher (`ip0`, `ip1`, ...).
    pub channel: String,
    /// Base port offset within the channel's port band.
    #[serde(default)]
    pub port: u16,
}

/// The installed rules for one `(version, operation, service)` triple.
/// Immutable once committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBundle {
    /// The service this bundle belongs to.
    pub service: String,
    /// The operation this bundle scopes.
    pub operation: String,
    /// T_in guard; absent means always admitted.
    #[serde(default)]
    pub guard: Option<GuardRule>,
    /// T_out targets: many = fork, one = edge/merge, none = terminate.
    #[serde(default)]
    pub routes: Vec<RouteTarget>,
    /// Join arity at this place; 1 for edge/merge nodes.
    #[serde(default = "default_arity")]
    pub arity: usize,
}

fn default_arity() -> usize {
    1
}

impl RuleBundle {
    /// Parse installed bundle text.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Fork width implied by the routing rules.
    pub fn fan_out(&self) -> usize {
        self.routes.len()
    }
}

#[cfg(test)]
#[path = "bundle_tests.rs"]
mod tests;
