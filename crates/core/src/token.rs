// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The token record: infrastructure envelope plus opaque business payload.
//!
//! Envelope fields are read and written by the orchestration core; the
//! payload passes through untouched except for enrichment, which appends
//! under well-known field names and never removes `original_token`.

use crate::seq::{RuleBaseVersion, SequenceId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload field holding the raw ingress text of the first service in
/// the workflow. Set once, never rewritten.
pub const ORIGINAL_TOKEN: &str = "original_token";

/// Payload field stamped by the event generator at mint time. Retained
/// through envelope stripping so observers can compute end-to-end times.
pub const WORKFLOW_START_TIME: &str = "workflow_start_time";

pub const SERVICE_START_TIME: &str = "service_start_time";
pub const SERVICE_END_TIME: &str = "service_end_time";
pub const SERVICE_PROCESSING_TIME_MS: &str = "service_processing_time_ms";

/// Infrastructure fields stripped from the payload before business
/// invocation. `workflow_start_time` is deliberately not among them.
pub const INFRA_FIELDS: [&str; 4] =
    [ORIGINAL_TOKEN, SERVICE_START_TIME, SERVICE_END_TIME, SERVICE_PROCESSING_TIME_MS];

/// Token header: identity and scheduling hints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "sequenceId")]
    pub sequence_id: SequenceId,
    #[serde(rename = "ruleBaseVersion")]
    pub rule_base_version: RuleBaseVersion,
    // Wire name is the source contract's spelling.
    #[serde(rename = "priortiseSID")]
    pub prioritise_sid: bool,
    #[serde(rename = "monitorIncomingEvents")]
    pub monitor_incoming_events: bool,
}

/// Routing target and admission filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(rename = "operationName")]
    pub operation_name: String,
}

/// Correlation key and validity deadline for join synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinAttribute {
    #[serde(rename = "attributeName")]
    pub attribute_name: String,
    #[serde(rename = "attributeValue")]
    pub attribute_value: String,
    /// Absolute validity deadline, ms since epoch.
    #[serde(rename = "notAfter")]
    pub not_after: u64,
    pub status: String,
}

/// Monitoring observer data. Never gates routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorData {
    #[serde(rename = "processStartTime")]
    pub process_start_time: u64,
    #[serde(rename = "processElapsedTime")]
    pub process_elapsed_time: u64,
    #[serde(rename = "callingService")]
    pub calling_service: String,
}

/// A typed data packet flowing through the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub header: Header,
    pub service: ServiceRef,
    #[serde(rename = "joinAttribute")]
    pub join_attribute: JoinAttribute,
    #[serde(rename = "monitorData")]
    pub monitor_data: MonitorData,
    pub payload: Value,
}

impl Token {
    pub fn sequence_id(&self) -> SequenceId {
        self.header.sequence_id
    }

    pub fn not_after(&self) -> u64 {
        self.join_attribute.not_after
    }

    /// Expired at or past the deadline (a token with `notAfter == now`
    /// is dropped).
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.join_attribute.not_after
    }

    /// Admin tokens skip monitor emission but follow the same routing
    /// discipline. Both the id band and the version tag mark the range.
    pub fn is_admin(&self) -> bool {
        self.header.sequence_id.is_admin() || self.header.rule_base_version.is_admin()
    }

    /// Whether this node should process the token at all.
    pub fn targets(&self, service_name: &str) -> bool {
        self.service.service_name == service_name
    }

    /// The business payload object, if the payload is an object.
    pub fn payload_object(&self) -> Option<&serde_json::Map<String, Value>> {
        self.payload.as_object()
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
