// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token ingress: the UDP receive loop, chunk reassembly, admission
//! filters, and the deadline-aware priority queue.
//!
//! Admission order: service filter (silent), committed-version check,
//! deadline check, then capacity. Tokens whose join is already in
//! progress bypass capacity so a partial synchronization cannot
//! deadlock behind a full queue.

use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tf_core::{Clock, Counters, Event, LoaderSettings, Token};
use tf_rules::RuleStore;
use tf_wire::{classify, maybe_gunzip, Frame, Reassembler};

use crate::forkjoin::{ForkJoinRegistry, JoinInput};
use crate::scheduler::prioritise;

/// One unit of work for the orchestrator: a token plus its raw ingress
/// text, or a completed join set travelling as the survivor.
#[derive(Debug, Clone)]
pub struct QueuedToken {
    pub token: Token,
    pub raw: String,
    /// Present when this entry is a completed-join survivor; the parked
    /// siblings in branch order.
    pub join_set: Option<Vec<JoinInput>>,
}

struct HeapEntry {
    key: u64,
    order: u64,
    item: QueuedToken,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.order == other.order
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.key, self.order).cmp(&(other.key, other.order))
    }
}

struct QueueInner {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    next_order: u64,
    closed: bool,
}

/// Bounded min-heap keyed by priority then insertion order.
pub struct TokenQueue {
    inner: Mutex<QueueInner>,
    capacity: usize,
    notify: Notify,
}

impl TokenQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                next_order: 0,
                closed: false,
            }),
            capacity,
            notify: Notify::new(),
        }
    }

    /// Enqueue under the given key. Returns false when the queue is at
    /// capacity and the entry may not bypass it.
    pub fn push(&self, item: QueuedToken, key: u64, bypass_capacity: bool) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return false;
            }
            if !bypass_capacity && inner.heap.len() >= self.capacity {
                return false;
            }
            let order = inner.next_order;
            inner.next_order += 1;
            inner.heap.push(Reverse(HeapEntry { key, order, item }));
        }
        self.notify.notify_one();
        true
    }

    /// Dequeue the lowest-keyed entry, waiting until one is available.
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop(&self) -> Option<QueuedToken> {
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock();
                if let Some(Reverse(entry)) = inner.heap.pop() {
                    return Some(entry.item);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Close the queue; waiters drain what remains, then get `None`.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The token-ingress reactor for one node.
pub struct Reactor<C: Clock> {
    service_name: String,
    settings: LoaderSettings,
    store: Arc<RuleStore>,
    forkjoin: Arc<ForkJoinRegistry>,
    queue: Arc<TokenQueue>,
    counters: Arc<Counters>,
    events: mpsc::UnboundedSender<Event>,
    clock: C,
    reassembler: Mutex<Reassembler>,
}

impl<C: Clock> Reactor<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        service_name: String,
        settings: LoaderSettings,
        store: Arc<RuleStore>,
        forkjoin: Arc<ForkJoinRegistry>,
        queue: Arc<TokenQueue>,
        counters: Arc<Counters>,
        events: mpsc::UnboundedSender<Event>,
        clock: C,
    ) -> Self {
        let reassembler = Mutex::new(Reassembler::new(settings.reactor.chunk_timeout_ms));
        Self {
            service_name,
            settings,
            store,
            forkjoin,
            queue,
            counters,
            events,
            clock,
            reassembler,
        }
    }

    /// Receive loop. Runs until cancelled.
    pub async fn run(self: Arc<Self>, socket: UdpSocket, cancel: CancellationToken) {
        let mut buf = vec![0_u8; 65_536];
        let mut sweep = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sweep.tick() => self.sweep_chunks(),
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, _)) => self.handle_datagram(&buf[..len]),
                    Err(e) => warn!(error = %e, "token socket receive failed"),
                },
            }
        }
        debug!("token reactor stopped");
    }

    /// Process one datagram: decompress, classify, reassemble, admit.
    pub fn handle_datagram(&self, bytes: &[u8]) {
        let plain = match maybe_gunzip(bytes) {
            Ok(plain) => plain,
            Err(e) => {
                self.drop_malformed(format!("bad compression: {e}"));
                return;
            }
        };
        self.handle_plain(&plain);
    }

    fn handle_plain(&self, plain: &[u8]) {
        match classify(plain) {
            Ok(Frame::Token(token)) => {
                let raw = String::from_utf8_lossy(plain).into_owned();
                self.admit(*token, raw);
            }
            Ok(Frame::Chunk(envelope)) => {
                let now = self.clock.epoch_ms();
                let completed = {
                    let mut reassembler = self.reassembler.lock();
                    reassembler.accept(envelope, now)
                };
                match completed {
                    Ok(Some(bytes)) => match maybe_gunzip(&bytes) {
                        Ok(plain) => self.handle_plain(&plain),
                        Err(e) => self.drop_malformed(format!("bad reassembled packet: {e}")),
                    },
                    Ok(None) => {}
                    Err(e) => self.drop_malformed(e.to_string()),
                }
            }
            Ok(Frame::RuleInstall(_)) => {
                debug!("rule-install packet on token port, ignoring");
            }
            Err(e) => self.drop_malformed(e.to_string()),
        }
    }

    /// Admission filter chain, then enqueue.
    fn admit(&self, token: Token, raw: String) {
        let now = self.clock.epoch_ms();
        let sequence_id = token.sequence_id();

        // Normal filter, not an error: this node only hosts one service.
        if !token.targets(&self.service_name) {
            debug!(%sequence_id, target = %token.service.service_name, "token filtered");
            return;
        }

        let version = token.header.rule_base_version.as_str();
        let operation = &token.service.operation_name;
        if !self.store.accepts(version, &self.service_name, operation) {
            self.counters.version_rejected();
            self.send_event(Event::VersionRejected {
                sequence_id,
                version: version.to_string(),
            });
            return;
        }

        let Some(key) = prioritise(&token, now, now) else {
            self.counters.expired();
            self.send_event(Event::TokenExpired {
                sequence_id,
                not_after: token.not_after(),
                now,
            });
            return;
        };

        // A sibling of an in-progress join may grow the queue past
        // capacity; rejecting it would deadlock the partial join.
        let required = self.store.required_arity(version, operation);
        let bypass = required > 1
            && sequence_id.is_child()
            && self.forkjoin.in_progress(operation, sequence_id.parent());

        let admitted_event = Event::TokenAdmitted {
            sequence_id,
            service: token.service.service_name.clone(),
            operation: operation.clone(),
        };
        let monitor_this = token.header.monitor_incoming_events && !token.is_admin();
        let item = QueuedToken { token, raw, join_set: None };
        if !self.queue.push(item, key, bypass) {
            self.counters.queue_full();
            self.send_event(Event::QueueFull { sequence_id, capacity: self.queue.capacity() });
            return;
        }
        if monitor_this {
            self.send_event(admitted_event);
        }
    }

    fn sweep_chunks(&self) {
        let now = self.clock.epoch_ms();
        let expired = self.reassembler.lock().sweep(now);
        for set in expired {
            self.counters.chunk_timeout();
            self.send_event(Event::ChunkSetExpired {
                correlation_id: set.correlation_id,
                received: set.received,
                total: set.total,
            });
        }
    }

    fn drop_malformed(&self, reason: String) {
        self.counters.malformed();
        debug!(%reason, "malformed datagram dropped");
        self.send_event(Event::TokenMalformed { reason });
    }

    fn send_event(&self, event: Event) {
        // Gate on the node-wide monitor switch for admitted-token
        // observations; drop/error events always flow.
        if matches!(event, Event::TokenAdmitted { .. })
            && !self.settings.monitor.monitor_incoming_events
        {
            return;
        }
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "reactor_tests.rs"]
mod tests;
