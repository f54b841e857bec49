// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fork fan-out, join synchronization, and join deadline reaping.

use crate::helpers::*;
use serde_json::json;
use std::time::Duration;
use tf_core::SequenceId;
use tf_node::EventGenerator;
use tf_rules::{RouteTarget, RuleBundle};
use tf_wire::encode_token;
use tokio::net::UdpSocket;

fn fork_bundle(sink: &Sink, arity: usize) -> RuleBundle {
    let routes = (0..arity)
        .map(|_| RouteTarget {
            service: "Assessment".into(),
            operation: "collectAssessment".into(),
            channel: "ip0".into(),
            port: sink.route_port(),
        })
        .collect();
    RuleBundle {
        service: "Triage".into(),
        operation: "processTriageAssessment".into(),
        guard: None,
        routes,
        arity: 1,
    }
}

fn join_bundle(sink: &Sink) -> RuleBundle {
    RuleBundle {
        service: "Assessment".into(),
        operation: "collectAssessment".into(),
        guard: None,
        routes: vec![RouteTarget {
            service: "Terminate".into(),
            operation: "terminate".into(),
            channel: "ip0".into(),
            port: sink.route_port(),
        }],
        arity: 3,
    }
}

#[tokio::test]
async fn fork_children_carry_sequential_sibling_ids() {
    let sink = Sink::bind().await;
    let (node, _dir) = start_node(
        "Triage",
        "triage-s3a",
        3,
        103,
        "v001",
        &[fork_bundle(&sink, 3)],
        &["processTriageAssessment"],
    )
    .await;

    let generator = EventGenerator::new(1, 30_000);
    let token = generator
        .mint("Triage", "processTriageAssessment", json!({"case": 9}))
        .expect("mint");
    send_token(&token, node.token_addr().port()).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(sink.recv_token().await.sequence_id().0);
    }
    ids.sort_unstable();
    assert_eq!(ids, vec![1_000_001, 1_000_002, 1_000_003]);
    for id in ids {
        assert_eq!(SequenceId(id).parent(), SequenceId(1_000_000));
    }
    node.shutdown().await;
}

#[tokio::test]
async fn join_emits_one_survivor_from_out_of_order_arrivals() {
    let sink = Sink::bind().await;
    let (node, _dir) = start_node(
        "Assessment",
        "assessment-s3b",
        4,
        104,
        "v001",
        &[join_bundle(&sink)],
        &["collectAssessment"],
    )
    .await;

    let generator = EventGenerator::new(1, 30_000);
    let parent = generator
        .mint("Assessment", "collectAssessment", json!({}))
        .expect("mint")
        .sequence_id();

    // Arrivals in order 3, 1, 2.
    let sender = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    for branch in [3_u64, 1, 2] {
        let mut child = generator
            .mint("Assessment", "collectAssessment", json!({"branch": branch}))
            .expect("mint");
        child.header.sequence_id = parent.child(branch).expect("child id");
        let bytes = encode_token(&child).expect("encode");
        sender
            .send_to(&bytes, ("127.0.0.1", node.token_addr().port()))
            .await
            .expect("send");
    }

    // Exactly one survivor, carrying the parent id and all three
    // business payloads.
    let out = sink.recv_token().await;
    assert_eq!(out.sequence_id(), parent);
    let merged = out.payload["assessmentResults"]["merged"].as_array().expect("merged");
    assert_eq!(merged.len(), 3);
    let mut branches: Vec<u64> =
        merged.iter().map(|v| v["branch"].as_u64().expect("branch")).collect();
    branches.sort_unstable();
    assert_eq!(branches, vec![1, 2, 3]);

    sink.expect_nothing(Duration::from_millis(400)).await;
    node.shutdown().await;
}

#[tokio::test]
async fn expired_sibling_starves_the_join_and_the_rest_is_reaped() {
    let sink = Sink::bind().await;
    let mut bundle = join_bundle(&sink);
    bundle.arity = 2;
    let (node, _dir) = start_node(
        "Assessment",
        "assessment-s4",
        5,
        105,
        "v001",
        &[bundle],
        &["collectAssessment"],
    )
    .await;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("epoch")
        .as_millis() as u64;
    let generator = EventGenerator::new(1, 1_000);
    let parent = generator
        .mint("Assessment", "collectAssessment", json!({}))
        .expect("mint")
        .sequence_id();

    let sender = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    // First sibling has a short deadline and parks in the ledger.
    let mut alive = generator
        .mint("Assessment", "collectAssessment", json!({"branch": 1}))
        .expect("mint");
    alive.header.sequence_id = parent.child(1).expect("child");
    alive.join_attribute.not_after = now + 1_000;
    sender
        .send_to(&encode_token(&alive).expect("encode"), ("127.0.0.1", node.token_addr().port()))
        .await
        .expect("send");

    // Second sibling arrives already expired and is dropped on admission.
    let mut dead = generator
        .mint("Assessment", "collectAssessment", json!({"branch": 2}))
        .expect("mint");
    dead.header.sequence_id = parent.child(2).expect("child");
    dead.join_attribute.not_after = now.saturating_sub(1);
    sender
        .send_to(&encode_token(&dead).expect("encode"), ("127.0.0.1", node.token_addr().port()))
        .await
        .expect("send");

    // The join never completes; the parked sibling is reaped after its
    // deadline elapses.
    eventually("both expiries recorded", || node.counters().snapshot().expired >= 2).await;
    sink.expect_nothing(Duration::from_millis(400)).await;
    node.shutdown().await;
}
