// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rule-base installation: the dedicated rule listener, bundle
//! persistence, store rebuild, and the commitment ACK.
//!
//! A parse failure produces no ACK at all; the deployer treats silence
//! as a NAK and retransmits. The packet source address is threaded
//! explicitly to the ACK sender.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tf_core::{Clock, Counters, Event};
use tf_rules::{RuleBundle, RuleStore};
use tf_wire::{classify, maybe_gunzip, CommitmentAck, Frame, Reassembler, RuleInstallPacket};

use crate::deploy::rule_ack_port;

/// Deploy-time validity: fork fan-out and join arity fit the branch
/// space (1..=9999).
fn deploy_arity_ok(bundle: &RuleBundle) -> bool {
    let max = tf_core::seq::MAX_BRANCH as usize;
    bundle.arity >= 1 && bundle.arity <= max && bundle.fan_out() <= max
}

/// The rule-ingress listener for one node.
pub struct RuleHandler<C: Clock> {
    store: Arc<RuleStore>,
    rules_root: PathBuf,
    /// Remote deployments bind all interfaces and ACK on the versioned
    /// port band; local deployments stay on loopback and port 30_000.
    remote: bool,
    counters: Arc<Counters>,
    events: mpsc::UnboundedSender<Event>,
    clock: C,
    reassembler: Mutex<Reassembler>,
}

impl<C: Clock> RuleHandler<C> {
    pub fn new(
        store: Arc<RuleStore>,
        rules_root: PathBuf,
        remote: bool,
        counters: Arc<Counters>,
        events: mpsc::UnboundedSender<Event>,
        clock: C,
        chunk_timeout_ms: u64,
    ) -> Self {
        Self {
            store,
            rules_root,
            remote,
            counters,
            events,
            clock,
            reassembler: Mutex::new(Reassembler::new(chunk_timeout_ms)),
        }
    }

    /// Receive loop for the rule listener socket. Runs until cancelled.
    pub async fn run(self: Arc<Self>, socket: UdpSocket, cancel: CancellationToken) {
        let socket = Arc::new(socket);
        let mut buf = vec![0_u8; 65_536];
        let mut sweep = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sweep.tick() => {
                    let now = self.clock.epoch_ms();
                    for set in self.reassembler.lock().sweep(now) {
                        self.counters.chunk_timeout();
                        let _ = self.events.send(Event::ChunkSetExpired {
                            correlation_id: set.correlation_id,
                            received: set.received,
                            total: set.total,
                        });
                    }
                }
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, src)) => {
                        if let Some(ack) = self.handle_datagram(&buf[..len], src) {
                            self.send_ack(&socket, src, &ack).await;
                        }
                    }
                    Err(e) => warn!(error = %e, "rule socket receive failed"),
                },
            }
        }
        debug!("rule handler stopped");
    }

    /// Process one datagram; returns the ACK to send, if any.
    pub fn handle_datagram(&self, bytes: &[u8], src: SocketAddr) -> Option<CommitmentAck> {
        let plain = match maybe_gunzip(bytes) {
            Ok(plain) => plain,
            Err(e) => {
                self.counters.malformed();
                warn!(%src, error = %e, "rule packet decompression failed");
                return None;
            }
        };
        self.handle_plain(&plain, src)
    }

    fn handle_plain(&self, plain: &[u8], src: SocketAddr) -> Option<CommitmentAck> {
        match classify(plain) {
            Ok(Frame::RuleInstall(packet)) => self.install(*packet, src),
            Ok(Frame::Chunk(envelope)) => {
                let now = self.clock.epoch_ms();
                let completed = self.reassembler.lock().accept(envelope, now);
                match completed {
                    Ok(Some(bytes)) => match maybe_gunzip(&bytes) {
                        Ok(plain) => self.handle_plain(&plain, src),
                        Err(e) => {
                            self.counters.malformed();
                            warn!(%src, error = %e, "reassembled rule packet invalid");
                            None
                        }
                    },
                    Ok(None) => None,
                    Err(e) => {
                        self.counters.malformed();
                        warn!(%src, error = %e, "rule chunk rejected");
                        None
                    }
                }
            }
            Ok(Frame::Token(_)) => {
                debug!(%src, "token packet on rule port, ignoring");
                None
            }
            Err(e) => {
                // Silence is the NAK: the deployer retransmits.
                self.counters.malformed();
                warn!(%src, error = %e, "rule install parse failed, no ack");
                None
            }
        }
    }

    /// Validate, persist, and commit one bundle. Returns the ACK when
    /// the packet requested commitment.
    fn install(&self, packet: RuleInstallPacket, src: SocketAddr) -> Option<CommitmentAck> {
        let version = packet.header.rule_base_version.clone();
        let service = packet.target_service.service_name.clone();
        let operation = packet.target_service.operation_name.clone();

        let bundle = match RuleBundle::parse(&packet.rule_file_data.data) {
            Ok(bundle) => bundle,
            Err(e) => {
                self.counters.malformed();
                warn!(%src, %version, %operation, error = %e, "bundle parse failed, no ack");
                return None;
            }
        };
        if bundle.service != service || bundle.operation != operation {
            self.counters.malformed();
            warn!(%src, %version, %operation, "bundle does not match its target, no ack");
            return None;
        }
        if !deploy_arity_ok(&bundle) {
            self.counters.malformed();
            warn!(%src, %version, %operation, "bundle arity out of range, no ack");
            return None;
        }

        if let Err(e) = RuleStore::persist(
            &self.rules_root,
            &version,
            &operation,
            &service,
            &packet.rule_file_data.data,
        ) {
            warn!(%src, %version, %operation, error = %e, "bundle persist failed, no ack");
            return None;
        }

        let count = self.store.commit(&version, bundle);
        info!(%version, %operation, %service, count, "rule bundle installed");
        let _ = self.events.send(Event::RuleBaseCommitted {
            version: version.clone(),
            operations: count,
        });

        packet
            .header
            .rule_base_commitment
            .then(|| CommitmentAck { version, count })
    }

    /// ACK destination: the sender's host, on the mode-dependent port.
    pub fn ack_addr(&self, src: SocketAddr, ack: &CommitmentAck) -> String {
        let version_number = tf_core::RuleBaseVersion::new(ack.version.clone())
            .number()
            .unwrap_or(0);
        format!("{}:{}", src.ip(), rule_ack_port(self.remote, version_number))
    }

    async fn send_ack(&self, socket: &UdpSocket, src: SocketAddr, ack: &CommitmentAck) {
        let addr = self.ack_addr(src, ack);
        match socket.send_to(ack.to_line().as_bytes(), &addr).await {
            Ok(_) => debug!(%addr, ack = %ack.to_line(), "commitment ack sent"),
            // No retry: ACK loss leaves the deployer to retransmit.
            Err(e) => warn!(%addr, error = %e, "commitment ack send failed"),
        }
    }
}

#[cfg(test)]
#[path = "rule_handler_tests.rs"]
mod tests;
