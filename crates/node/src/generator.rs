// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event generator: mints fresh parent tokens into a workflow.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

use tf_core::{
    Clock, Header, JoinAttribute, MonitorData, SeqError, SequenceId, ServiceRef, SystemClock,
    Token, WORKFLOW_START_TIME,
};

/// Source node that introduces new tokens into the graph. Each minted
/// token gets the next workflow ordinal in the generator's version band
/// and a branch-0 sequence id.
pub struct EventGenerator<C: Clock = SystemClock> {
    version: u32,
    ttl_ms: u64,
    next_ordinal: AtomicU64,
    clock: C,
}

impl EventGenerator<SystemClock> {
    pub fn new(version: u32, ttl_ms: u64) -> Self {
        Self::with_clock(version, ttl_ms, SystemClock)
    }
}

impl<C: Clock> EventGenerator<C> {
    pub fn with_clock(version: u32, ttl_ms: u64, clock: C) -> Self {
        Self { version, ttl_ms, next_ordinal: AtomicU64::new(0), clock }
    }

    /// Mint a token addressed at `(service, operation)` carrying the
    /// given business payload, stamped with `workflow_start_time = now`.
    pub fn mint(
        &self,
        service: &str,
        operation: &str,
        payload: Value,
    ) -> Result<Token, SeqError> {
        let ordinal = self.next_ordinal.fetch_add(1, Ordering::SeqCst);
        let sequence_id = SequenceId::compose(self.version, ordinal)?;
        let now = self.clock.epoch_ms();

        let mut payload = payload;
        if let Some(object) = payload.as_object_mut() {
            object.insert(WORKFLOW_START_TIME.to_string(), Value::from(now));
        }

        Ok(Token {
            header: Header {
                sequence_id,
                rule_base_version: sequence_id.rule_base_version(),
                prioritise_sid: true,
                monitor_incoming_events: true,
            },
            service: ServiceRef {
                service_name: service.to_string(),
                operation_name: operation.to_string(),
            },
            join_attribute: JoinAttribute {
                attribute_name: "status".to_string(),
                attribute_value: "true".to_string(),
                not_after: now + self.ttl_ms,
                status: "true".to_string(),
            },
            monitor_data: MonitorData {
                process_start_time: now,
                process_elapsed_time: 0,
                calling_service: "EventGenerator".to_string(),
            },
            payload,
        })
    }
}

#[cfg(test)]
#[path = "generator_tests.rs"]
mod tests;
