// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-token orchestration loop.
//!
//! Workers drain the priority queue; each token is owned by exactly one
//! worker from dequeue through publish. Per-token states:
//! `RECEIVED → ADMITTED → {SINGLE | JOIN_WAITING} → GUARDED → INVOKED →
//! ENRICHED → PUBLISHED | DROPPED`. A join arrival that does not
//! complete its set parks in the registry and releases the worker; the
//! completing sibling re-enqueues the survivor.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tf_core::{Clock, Counters, Event, LoaderSettings, SequenceId};
use tf_rules::{RuleBundle, RuleEngine, RuleStore};

use crate::deploy::Deployment;
use crate::enricher;
use crate::forkjoin::{ForkJoinRegistry, JoinInput};
use crate::invoker::{InvokeError, Invoker};
use crate::publisher::Publisher;
use crate::reactor::{QueuedToken, TokenQueue};
use crate::scheduler::{prioritise, PREEMPT_KEY};

/// Per-token processing states, for tracing and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Received,
    Admitted,
    JoinWaiting,
    Guarded,
    Invoked,
    Enriched,
    Published,
    Dropped,
}

impl fmt::Display for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenState::Received => "RECEIVED",
            TokenState::Admitted => "ADMITTED",
            TokenState::JoinWaiting => "JOIN_WAITING",
            TokenState::Guarded => "GUARDED",
            TokenState::Invoked => "INVOKED",
            TokenState::Enriched => "ENRICHED",
            TokenState::Published => "PUBLISHED",
            TokenState::Dropped => "DROPPED",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

/// The orchestrator for one node.
pub struct Runtime<C: Clock> {
    deploy: Deployment,
    settings: LoaderSettings,
    store: Arc<RuleStore>,
    engine: Arc<dyn RuleEngine>,
    queue: Arc<TokenQueue>,
    forkjoin: Arc<ForkJoinRegistry>,
    invoker: Invoker<C>,
    publisher: Arc<Publisher>,
    counters: Arc<Counters>,
    events: mpsc::UnboundedSender<Event>,
    clock: C,
}

impl<C: Clock> Runtime<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        deploy: Deployment,
        settings: LoaderSettings,
        store: Arc<RuleStore>,
        engine: Arc<dyn RuleEngine>,
        queue: Arc<TokenQueue>,
        forkjoin: Arc<ForkJoinRegistry>,
        invoker: Invoker<C>,
        publisher: Arc<Publisher>,
        counters: Arc<Counters>,
        events: mpsc::UnboundedSender<Event>,
        clock: C,
    ) -> Self {
        Self {
            deploy,
            settings,
            store,
            engine,
            queue,
            forkjoin,
            invoker,
            publisher,
            counters,
            events,
            clock,
        }
    }

    /// One worker of the pool: drain the queue until shutdown.
    pub async fn run_worker(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                item = self.queue.pop() => match item {
                    Some(item) => self.process(item).await,
                    None => break,
                },
            }
        }
        debug!("worker stopped");
    }

    /// Periodic join reaper: expire partial sets whose deadline passed.
    pub async fn run_join_reaper(self: Arc<Self>, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(std::time::Duration::from_millis(250));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => self.reap_joins(),
            }
        }
    }

    pub fn reap_joins(&self) {
        let now = self.clock.epoch_ms();
        for (join_node, parent, siblings) in self.forkjoin.sweep_expired(now) {
            for _ in &siblings {
                self.counters.expired();
            }
            let _ = self.events.send(Event::JoinExpired { join_node, parent, siblings });
        }
    }

    /// Drive one dequeued token through the state machine.
    pub async fn process(&self, item: QueuedToken) {
        let now = self.clock.epoch_ms();
        let sequence_id = item.token.sequence_id();

        // Deadline is authoritative at every step.
        if item.token.is_expired(now) {
            self.counters.expired();
            let _ = self.events.send(Event::TokenExpired {
                sequence_id,
                not_after: item.token.not_after(),
                now,
            });
            return;
        }

        let version = item.token.header.rule_base_version.as_str().to_string();
        let operation = item.token.service.operation_name.clone();
        let Some(bundle) = self.store.bundle(&version, &operation) else {
            // Version disappeared between admission and dequeue.
            self.counters.version_rejected();
            let _ = self.events.send(Event::VersionRejected { sequence_id, version });
            return;
        };

        let required = self.engine.required_arity(&bundle);
        if item.join_set.is_none() && required > 1 {
            self.join_arrival(item, required, now);
            return;
        }
        self.execute(item, bundle, required).await;
    }

    /// Register a join arrival; on completion, re-enqueue the survivor
    /// carrying the full arrival set.
    fn join_arrival(&self, item: QueuedToken, required: usize, now: u64) {
        let token = item.token;
        let sequence_id = token.sequence_id();
        let parent = sequence_id.parent();
        let operation = token.service.operation_name.clone();
        let admin = token.is_admin();

        let progress =
            self.forkjoin.register_arrival(&operation, token, item.raw, required);
        self.emit(admin, Event::JoinRegistered {
            join_node: operation.clone(),
            parent,
            sibling: sequence_id,
            arrived: progress.arrived,
            required: progress.required,
        });

        if !progress.complete {
            debug!(%sequence_id, state = %TokenState::JoinWaiting, "awaiting join partners");
            return;
        }
        // One caller wins the completed set; the losers were counted as
        // ordinary arrivals.
        let Some(set) = self.forkjoin.take_completed(&operation, parent) else {
            return;
        };

        let consumed: Vec<SequenceId> = set.iter().map(|i| i.token.sequence_id()).collect();
        let not_after = set.iter().map(|i| i.token.not_after()).min().unwrap_or(u64::MAX);

        // The survivor inherits the parent id and the set's minimum
        // deadline; payload accumulation happens at invocation.
        let mut survivor = set[0].token.clone();
        survivor.header.sequence_id = parent;
        survivor.join_attribute.not_after = not_after;

        self.emit(admin, Event::JoinCompleted {
            join_node: operation,
            parent,
            survivor: parent,
            consumed,
        });

        let key = if self.settings.monitor.enable_completed_join_priority {
            PREEMPT_KEY
        } else {
            match prioritise(&survivor, now, now) {
                Some(key) => key,
                None => {
                    self.counters.expired();
                    let _ = self.events.send(Event::TokenExpired {
                        sequence_id: parent,
                        not_after,
                        now,
                    });
                    return;
                }
            }
        };
        let survivor_item = QueuedToken { token: survivor, raw: String::new(), join_set: Some(set) };
        // Survivors always bypass capacity; dropping one would lose the
        // whole completed join.
        self.queue.push(survivor_item, key, true);
    }

    /// Guard, invoke, enrich, publish.
    async fn execute(&self, item: QueuedToken, bundle: RuleBundle, required: usize) {
        let token = &item.token;
        let sequence_id = token.sequence_id();
        let operation = token.service.operation_name.clone();
        let admin = token.is_admin();
        let now = self.clock.epoch_ms();

        if !self.engine.guard(token, &bundle) {
            let retry = bundle.guard.as_ref().is_some_and(|g| g.retry);
            if retry {
                // Retry edge: back to ADMITTED with the same sequence id.
                let _ = self.events.send(Event::GuardRetry {
                    sequence_id,
                    operation: operation.clone(),
                });
                if let Some(key) = prioritise(token, now, now) {
                    self.queue.push(item, key, true);
                } else {
                    self.counters.expired();
                }
            } else {
                self.counters.guard_absorbed();
                let _ = self.events.send(Event::GuardAbsorbed { sequence_id, operation });
            }
            return;
        }
        debug!(%sequence_id, state = %TokenState::Guarded, "guard passed");

        // Ingress enrichment per input token.
        let single = [JoinInput { token: token.clone(), raw: item.raw.clone() }];
        let inputs: &[JoinInput] = match &item.join_set {
            Some(set) => set,
            None => &single,
        };
        let views: Vec<enricher::IngressView> =
            inputs.iter().map(|i| enricher::ingress(&i.token, &i.raw)).collect();
        let original_token = views[0].original_token.clone();
        let workflow_start_time = views.iter().find_map(|v| v.workflow_start_time);
        let clean_inputs: Vec<serde_json::Value> =
            views.into_iter().map(|v| v.clean).collect();

        let invocation = match self
            .invoker
            .invoke(
                &self.deploy.service_name,
                &operation,
                sequence_id,
                required,
                clean_inputs,
            )
            .await
        {
            Ok(invocation) => invocation,
            Err(e) => {
                // Infrastructure dispatch failure: nothing to route.
                self.counters.invocation_error();
                warn!(%sequence_id, error = %e, "invocation dispatch failed");
                let _ = self.events.send(Event::InvocationFailed {
                    sequence_id,
                    operation,
                    error: e.to_string(),
                });
                return;
            }
        };
        if invocation.ok {
            self.emit(admin, Event::Invoked {
                sequence_id,
                operation: operation.clone(),
                elapsed_ms: invocation.processing_time_ms(),
            });
        } else {
            // Synthetic error token: surfaced, then routed like any other.
            self.counters.invocation_error();
            let _ = self.events.send(Event::InvocationFailed {
                sequence_id,
                operation: operation.clone(),
                error: invocation.error.clone().unwrap_or_default(),
            });
        }

        let enriched =
            enricher::egress(&operation, &invocation, &original_token, workflow_start_time);
        debug!(%sequence_id, state = %TokenState::Enriched, "result enriched");

        let routes = self.engine.route(token, &bundle);
        if routes.is_empty() {
            self.emit(admin, Event::TokenTerminated { sequence_id });
            return;
        }

        let fork = routes.len() > 1;
        for (k, target) in routes.iter().enumerate() {
            let child_id = if fork {
                match sequence_id.child(k as u64 + 1) {
                    Ok(id) => id,
                    Err(e) => {
                        // Deploy-time validation bounds fan-out; reaching
                        // this means a malformed bundle slipped through.
                        warn!(%sequence_id, error = %e, "fork branch out of range");
                        continue;
                    }
                }
            } else {
                sequence_id
            };

            let mut out = token.clone();
            out.header.sequence_id = child_id;
            out.service.service_name = target.service.clone();
            out.service.operation_name = target.operation.clone();
            out.monitor_data.calling_service = self.deploy.service_name.clone();
            out.monitor_data.process_elapsed_time =
                workflow_start_time.map_or(0, |start| now.saturating_sub(start));
            out.payload = enriched.clone();

            match self.publisher.publish(&out, target).await {
                Ok(()) => {
                    self.emit(admin, Event::TokenPublished {
                        sequence_id: child_id,
                        service: target.service.clone(),
                        operation: target.operation.clone(),
                        channel: target.channel.clone(),
                    });
                }
                Err(e) => {
                    // One child's failure never aborts its siblings.
                    self.counters.publish_failure();
                    let _ = self.events.send(Event::PublishFailed {
                        sequence_id: child_id,
                        channel: target.channel.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        debug!(%sequence_id, state = %TokenState::Published, "token complete");
    }

    /// Monitor-class events are suppressed for admin traffic.
    fn emit(&self, admin: bool, event: Event) {
        if admin && event.is_monitor_class() {
            return;
        }
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
