// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Business-logic dispatch.
//!
//! Handlers are registered at node startup under
//! `(serviceName, operationName)`; dispatch is an explicit table lookup
//! and arity is checked at the call site. A business failure is a
//! first-class outcome: the invoker returns a synthetic error result
//! that keeps flowing through enrichment and routing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use tf_core::{Clock, SequenceId};

/// A business failure surfaced by a handler.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BusinessError(pub String);

impl BusinessError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Infrastructure-side dispatch failures.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("no handler registered for {service}/{operation}")]
    NoHandler { service: String, operation: String },
    #[error("arity mismatch for {operation}: required {required}, got {actual}")]
    Arity { operation: String, required: usize, actual: usize },
}

/// Context threaded into every business call.
#[derive(Debug, Clone)]
pub struct InvokeContext {
    pub sequence_id: SequenceId,
    pub place_name: String,
    pub build_version: String,
}

/// The business entry point hosted at a place.
#[async_trait]
pub trait BusinessHandler: Send + Sync {
    /// `inputs` are clean business payloads, one per incoming arity
    /// (1 for edge/merge, N for an N-ary join).
    async fn call(&self, ctx: &InvokeContext, inputs: Vec<Value>) -> Result<Value, BusinessError>;
}

/// Adapter for plain closures, used in tests and demo deployments.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F> BusinessHandler for FnHandler<F>
where
    F: Fn(&InvokeContext, Vec<Value>) -> Result<Value, BusinessError> + Send + Sync,
{
    async fn call(&self, ctx: &InvokeContext, inputs: Vec<Value>) -> Result<Value, BusinessError> {
        (self.0)(ctx, inputs)
    }
}

/// Startup-populated handler table.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(String, String), Arc<dyn BusinessHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        service: impl Into<String>,
        operation: impl Into<String>,
        handler: Arc<dyn BusinessHandler>,
    ) {
        self.handlers.insert((service.into(), operation.into()), handler);
    }

    pub fn get(&self, service: &str, operation: &str) -> Option<Arc<dyn BusinessHandler>> {
        self.handlers.get(&(service.to_string(), operation.to_string())).cloned()
    }
}

/// A timed invocation outcome. `ok` is false when the result is the
/// synthetic error payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub result: Value,
    pub service_start_time: u64,
    pub service_end_time: u64,
    pub ok: bool,
    pub error: Option<String>,
}

impl Invocation {
    pub fn processing_time_ms(&self) -> u64 {
        self.service_end_time.saturating_sub(self.service_start_time)
    }
}

/// Dispatches and times business calls for one node.
pub struct Invoker<C: Clock> {
    registry: HandlerRegistry,
    clock: C,
    place_name: String,
    build_version: String,
}

impl<C: Clock> Invoker<C> {
    pub fn new(
        registry: HandlerRegistry,
        clock: C,
        place_name: String,
        build_version: String,
    ) -> Self {
        Self { registry, clock, place_name, build_version }
    }

    /// Invoke the handler for `(service, operation)` with arity-checked
    /// inputs. Business failures become a synthetic error result.
    pub async fn invoke(
        &self,
        service: &str,
        operation: &str,
        sequence_id: SequenceId,
        required_arity: usize,
        inputs: Vec<Value>,
    ) -> Result<Invocation, InvokeError> {
        if inputs.len() != required_arity {
            return Err(InvokeError::Arity {
                operation: operation.to_string(),
                required: required_arity,
                actual: inputs.len(),
            });
        }
        let handler = self.registry.get(service, operation).ok_or_else(|| {
            InvokeError::NoHandler {
                service: service.to_string(),
                operation: operation.to_string(),
            }
        })?;

        let ctx = InvokeContext {
            sequence_id,
            place_name: self.place_name.clone(),
            build_version: self.build_version.clone(),
        };

        let service_start_time = self.clock.epoch_ms();
        let outcome = handler.call(&ctx, inputs).await;
        let service_end_time = self.clock.epoch_ms();

        Ok(match outcome {
            Ok(result) => Invocation {
                result,
                service_start_time,
                service_end_time,
                ok: true,
                error: None,
            },
            Err(e) => {
                debug!(%sequence_id, operation, error = %e, "business call failed");
                Invocation {
                    result: json!({ "error": e.to_string(), "status": "ERROR" }),
                    service_start_time,
                    service_end_time,
                    ok: false,
                    error: Some(e.to_string()),
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "invoker_tests.rs"]
mod tests;
