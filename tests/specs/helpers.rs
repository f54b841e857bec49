// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures: node startup, rule seeding, datagram send/receive.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::UdpSocket;

use tf_core::{LoaderSettings, Token};
use tf_node::{
    Channel, Deployment, FnHandler, HandlerRegistry, InvokeContext, Node, NodeConfig,
};
use tf_rules::{RouteTarget, RuleBundle, RuleEngine, RuleStore, TableRuleEngine};
use tf_wire::{classify, decode_token, encode_token, maybe_gunzip, Frame, Reassembler};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A receiver standing in for a downstream place.
pub struct Sink {
    socket: UdpSocket,
    pub port: u16,
}

impl Sink {
    pub async fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind sink");
        let port = socket.local_addr().expect("sink addr").port();
        Self { socket, port }
    }

    /// Route-target port offset that lands on this sink through a
    /// channel with index 0.
    pub fn route_port(&self) -> u16 {
        self.port - 10_000
    }

    /// Receive one logical token, reassembling chunks as needed.
    pub async fn recv_token(&self) -> Token {
        let mut reassembler = Reassembler::new(60_000);
        let mut buf = vec![0_u8; 65_536];
        loop {
            let (len, _) = tokio::time::timeout(RECV_TIMEOUT, self.socket.recv_from(&mut buf))
                .await
                .expect("sink receive timed out")
                .expect("sink receive failed");
            match classify(&buf[..len]).expect("sink got unclassifiable datagram") {
                Frame::Token(token) => return *token,
                Frame::Chunk(envelope) => {
                    if let Some(bytes) = reassembler.accept(envelope, 0).expect("chunk") {
                        let plain = maybe_gunzip(&bytes).expect("gunzip");
                        return decode_token(&plain).expect("decode reassembled token");
                    }
                }
                Frame::RuleInstall(_) => panic!("unexpected rule install at sink"),
            }
        }
    }

    /// Expect silence: no datagram within the grace period.
    pub async fn expect_nothing(&self, grace: Duration) {
        let mut buf = vec![0_u8; 65_536];
        let received =
            tokio::time::timeout(grace, self.socket.recv_from(&mut buf)).await;
        assert!(received.is_err(), "sink unexpectedly received a datagram");
    }
}

/// Deployment for a test node: channel `ip0` points back at loopback
/// with index 0 so route-target ports address sinks directly.
pub fn deployment(service: &str, place: &str, channel_index: u16, base_port: u16) -> Deployment {
    let mut channels = HashMap::new();
    channels.insert("ip0".to_string(), Channel { host: "127.0.0.1".into(), channel_index: 0 });
    Deployment {
        service_name: service.to_string(),
        place_id: place.to_string(),
        channel_index,
        base_port,
        build_version: "spec-build".to_string(),
        operations: vec![],
        channels,
    }
}

pub fn edge_bundle(service: &str, operation: &str, sink: &Sink) -> RuleBundle {
    RuleBundle {
        service: service.into(),
        operation: operation.into(),
        guard: None,
        routes: vec![RouteTarget {
            service: "Terminate".into(),
            operation: "terminate".into(),
            channel: "ip0".into(),
            port: sink.route_port(),
        }],
        arity: 1,
    }
}

/// Seed committed bundles on disk so the node reloads them at startup.
pub fn seed_rules(state_dir: &std::path::Path, version: &str, bundles: &[RuleBundle]) {
    for bundle in bundles {
        RuleStore::persist(
            &state_dir.join("rules"),
            version,
            &bundle.operation,
            &bundle.service,
            &bundle.to_text().expect("bundle text"),
        )
        .expect("persist bundle");
    }
}

/// Handler registry with an echoing single-input handler and a merging
/// join handler for the given service.
pub fn standard_registry(service: &str, operations: &[&str]) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    for operation in operations {
        registry.register(
            service.to_string(),
            operation.to_string(),
            Arc::new(FnHandler(|_: &InvokeContext, mut inputs: Vec<Value>| {
                Ok(match inputs.len() {
                    1 => inputs.remove(0),
                    _ => json!({ "merged": inputs }),
                })
            })),
        );
    }
    registry
}

/// Start a node with seeded v-versioned rules and the standard registry.
pub async fn start_node(
    service: &str,
    place: &str,
    channel_index: u16,
    base_port: u16,
    version: &str,
    bundles: &[RuleBundle],
    operations: &[&str],
) -> (Node, tempfile::TempDir) {
    start_node_with_engine(
        service,
        place,
        channel_index,
        base_port,
        version,
        bundles,
        operations,
        Arc::new(TableRuleEngine::new()),
    )
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn start_node_with_engine(
    service: &str,
    place: &str,
    channel_index: u16,
    base_port: u16,
    version: &str,
    bundles: &[RuleBundle],
    operations: &[&str],
    engine: Arc<dyn RuleEngine>,
) -> (Node, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_rules(dir.path(), version, bundles);
    let node = Node::start(
        NodeConfig {
            state_dir: dir.path().to_path_buf(),
            deploy: deployment(service, place, channel_index, base_port),
            settings: LoaderSettings::default(),
        },
        standard_registry(service, operations),
        engine,
    )
    .await
    .expect("node start");
    (node, dir)
}

/// Send one token packet, uncompressed, to a node's token listener.
pub async fn send_token(token: &Token, port: u16) -> String {
    let bytes = encode_token(token).expect("encode");
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind sender");
    socket.send_to(&bytes, ("127.0.0.1", port)).await.expect("send token");
    String::from_utf8(bytes).expect("utf8 packet")
}

/// Wait for a condition with a deadline, polling at 20ms.
pub async fn eventually<F: Fn() -> bool>(what: &str, check: F) {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}
