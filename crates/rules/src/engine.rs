// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The rule engine seam.
//!
//! The orchestrator depends only on this interface; the table-driven
//! engine below evaluates the declarative bundle form and is the
//! in-tree implementation. A query-engine-backed implementation can be
//! substituted without touching the orchestrator.

use crate::bundle::{RouteTarget, RuleBundle};
use tf_core::Token;

/// Routing decisions over a token and its version-matched bundle.
pub trait RuleEngine: Send + Sync + 'static {
    /// Evaluate the T_in admission guard.
    fn guard(&self, token: &Token, bundle: &RuleBundle) -> bool;

    /// Evaluate T_out routing. Multiple targets = fork, one = edge or
    /// merge, none = terminate.
    fn route(&self, token: &Token, bundle: &RuleBundle) -> Vec<RouteTarget>;

    /// Join arity for an operation (1 for edge/merge nodes).
    fn required_arity(&self, bundle: &RuleBundle) -> usize;
}

/// Reference engine over the declarative bundle form.
#[derive(Debug, Default, Clone)]
pub struct TableRuleEngine;

impl TableRuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Look up the guarded field on the token: the join attribute when
    /// the name matches, a payload field otherwise.
    fn field_value(token: &Token, field: &str) -> Option<String> {
        if token.join_attribute.attribute_name == field {
            return Some(token.join_attribute.attribute_value.clone());
        }
        if field == "status" {
            return Some(token.join_attribute.status.clone());
        }
        token.payload.get(field).map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        })
    }
}

impl RuleEngine for TableRuleEngine {
    fn guard(&self, token: &Token, bundle: &RuleBundle) -> bool {
        match &bundle.guard {
            None => true,
            Some(rule) => Self::field_value(token, &rule.field)
                .is_some_and(|value| value == rule.equals),
        }
    }

    fn route(&self, _token: &Token, bundle: &RuleBundle) -> Vec<RouteTarget> {
        bundle.routes.clone()
    }

    fn required_arity(&self, bundle: &RuleBundle) -> usize {
        bundle.arity
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
