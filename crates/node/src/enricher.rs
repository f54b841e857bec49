// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload enrichment around the business call.
//!
//! Ingress strips infrastructure fields and unwraps the single-key
//! response envelope added by the previous hop; egress wraps the
//! business result under the operation-derived output key and stamps
//! service timings. `original_token` is captured on first ingress and
//! preserved verbatim from then on.

use serde_json::{Map, Value};
use tf_core::{
    Token, INFRA_FIELDS, ORIGINAL_TOKEN, SERVICE_END_TIME, SERVICE_PROCESSING_TIME_MS,
    SERVICE_START_TIME, WORKFLOW_START_TIME,
};

use crate::invoker::Invocation;

/// What ingress extraction yields for one input token.
#[derive(Debug, Clone, PartialEq)]
pub struct IngressView {
    /// Business payload with infrastructure fields removed.
    pub clean: Value,
    /// Raw ingress text of the workflow's first service.
    pub original_token: String,
    pub workflow_start_time: Option<u64>,
}

/// Extract the business payload from an input token. `raw` is the
/// decompressed ingress text, which becomes `original_token` when the
/// payload does not already carry one (the first service in the
/// workflow).
pub fn ingress(token: &Token, raw: &str) -> IngressView {
    let mut object = match token.payload.as_object() {
        Some(object) => object.clone(),
        None => Map::new(),
    };

    // Unwrap the `{"<placeId>": {...}}` envelope the previous hop
    // wrapped its response in.
    if object.len() == 1 {
        let inner = object.values().next().and_then(Value::as_object).cloned();
        if let Some(inner) = inner {
            object = inner;
        }
    }

    let original_token = object
        .get(ORIGINAL_TOKEN)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| raw.to_string());
    let workflow_start_time = object.get(WORKFLOW_START_TIME).and_then(Value::as_u64);

    for field in INFRA_FIELDS {
        object.remove(field);
    }

    IngressView { clean: Value::Object(object), original_token, workflow_start_time }
}

/// Derive the output key from the operation name:
/// `process<X>Assessment`, `fire<X>`, and `collect<X>` map to
/// `<x>Results`; anything else maps to `results`.
pub fn output_key(operation: &str) -> String {
    let stem = operation
        .strip_prefix("process")
        .and_then(|rest| rest.strip_suffix("Assessment"))
        .or_else(|| operation.strip_prefix("fire"))
        .or_else(|| operation.strip_prefix("collect"));
    match stem {
        Some(stem) if !stem.is_empty() => {
            let mut chars = stem.chars();
            match chars.next() {
                Some(first) => {
                    format!("{}{}Results", first.to_lowercase(), chars.as_str())
                }
                None => "results".to_string(),
            }
        }
        _ => "results".to_string(),
    }
}

/// Wrap a timed invocation result for publication. Infrastructure
/// fields are placed first; business fields never override them.
pub fn egress(
    operation: &str,
    invocation: &Invocation,
    original_token: &str,
    workflow_start_time: Option<u64>,
) -> Value {
    let mut wrapped = Map::new();
    wrapped.insert(ORIGINAL_TOKEN.to_string(), Value::String(original_token.to_string()));
    if let Some(start) = workflow_start_time {
        wrapped.insert(WORKFLOW_START_TIME.to_string(), Value::from(start));
    }
    wrapped.insert(SERVICE_START_TIME.to_string(), Value::from(invocation.service_start_time));
    wrapped.insert(SERVICE_END_TIME.to_string(), Value::from(invocation.service_end_time));
    wrapped.insert(
        SERVICE_PROCESSING_TIME_MS.to_string(),
        Value::from(invocation.processing_time_ms()),
    );

    match invocation.result.as_object() {
        Some(fields) => {
            for (name, value) in fields {
                wrapped.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
        None => {
            wrapped.insert("result".to_string(), invocation.result.clone());
        }
    }

    let mut outer = Map::new();
    outer.insert(output_key(operation), Value::Object(wrapped));
    Value::Object(outer)
}

#[cfg(test)]
#[path = "enricher_tests.rs"]
mod tests;
