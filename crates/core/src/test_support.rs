// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared by other crates' tests (feature `test-support`).

use crate::seq::SequenceId;
use crate::token::{Header, JoinAttribute, MonitorData, ServiceRef, Token};
use serde_json::{json, Value};

/// Builder for tokens with sensible defaults: version tag derived from
/// the sequence id, a far-future deadline, an empty object payload.
pub struct TokenBuilder {
    sequence_id: SequenceId,
    version: Option<String>,
    service: String,
    operation: String,
    not_after: u64,
    status: String,
    payload: Value,
    calling_service: String,
    prioritise_sid: bool,
    monitor_incoming_events: bool,
}

impl TokenBuilder {
    pub fn new(sequence_id: u64) -> Self {
        Self {
            sequence_id: SequenceId(sequence_id),
            version: None,
            service: "Triage".to_string(),
            operation: "processTriageAssessment".to_string(),
            not_after: u64::MAX,
            status: "true".to_string(),
            payload: json!({}),
            calling_service: "EventGenerator".to_string(),
            prioritise_sid: true,
            monitor_incoming_events: true,
        }
    }

    pub fn version(mut self, tag: &str) -> Self {
        self.version = Some(tag.to_string());
        self
    }

    pub fn service(mut self, name: &str) -> Self {
        self.service = name.to_string();
        self
    }

    pub fn operation(mut self, name: &str) -> Self {
        self.operation = name.to_string();
        self
    }

    pub fn not_after(mut self, deadline_ms: u64) -> Self {
        self.not_after = deadline_ms;
        self
    }

    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn calling_service(mut self, name: &str) -> Self {
        self.calling_service = name.to_string();
        self
    }

    pub fn build(self) -> Token {
        let version = self
            .version
            .map(crate::seq::RuleBaseVersion::new)
            .unwrap_or_else(|| self.sequence_id.rule_base_version());
        Token {
            header: Header {
                sequence_id: self.sequence_id,
                rule_base_version: version,
                prioritise_sid: self.prioritise_sid,
                monitor_incoming_events: self.monitor_incoming_events,
            },
            service: ServiceRef { service_name: self.service, operation_name: self.operation },
            join_attribute: JoinAttribute {
                attribute_name: "status".to_string(),
                attribute_value: self.status.clone(),
                not_after: self.not_after,
                status: self.status,
            },
            monitor_data: MonitorData {
                process_start_time: 0,
                process_elapsed_time: 0,
                calling_service: self.calling_service,
            },
            payload: self.payload,
        }
    }
}
