// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version isolation: coexisting rule bases route independently, and
//! rule installation over UDP commits with an ACK.

use crate::helpers::*;
use serde_json::json;
use tf_core::SequenceId;
use tf_node::EventGenerator;
use tf_rules::{RouteTarget, RuleBundle};
use tf_wire::{CommitmentAck, RuleFileData, RuleInstallHeader, RuleInstallPacket, TargetService};
use tokio::net::UdpSocket;

fn routed_bundle(operation: &str, sink: &Sink, next_service: &str) -> RuleBundle {
    RuleBundle {
        service: "Triage".into(),
        operation: operation.into(),
        guard: None,
        routes: vec![RouteTarget {
            service: next_service.into(),
            operation: "terminate".into(),
            channel: "ip0".into(),
            port: sink.route_port(),
        }],
        arity: 1,
    }
}

#[tokio::test]
async fn coexisting_versions_route_through_their_own_bundles() {
    let sink_v1 = Sink::bind().await;
    let sink_v2 = Sink::bind().await;

    let dir = tempfile::tempdir().expect("tempdir");
    seed_rules(
        dir.path(),
        "v001",
        &[routed_bundle("processTriageAssessment", &sink_v1, "TerminateOne")],
    );
    seed_rules(
        dir.path(),
        "v002",
        &[routed_bundle("processTriageAssessment", &sink_v2, "TerminateTwo")],
    );
    let node = tf_node::Node::start(
        tf_node::NodeConfig {
            state_dir: dir.path().to_path_buf(),
            deploy: deployment("Triage", "triage-s6", 7, 107),
            settings: tf_core::LoaderSettings::default(),
        },
        standard_registry("Triage", &["processTriageAssessment"]),
        std::sync::Arc::new(tf_rules::TableRuleEngine::new()),
    )
    .await
    .expect("node start");

    // Identical business payloads, different version bands.
    let payload = json!({"patient": "p-77"});
    let gen_v1 = EventGenerator::new(1, 30_000);
    let gen_v2 = EventGenerator::new(2, 30_000);
    let t1 = gen_v1
        .mint("Triage", "processTriageAssessment", payload.clone())
        .expect("mint v1");
    let t2 = gen_v2
        .mint("Triage", "processTriageAssessment", payload)
        .expect("mint v2");
    send_token(&t1, node.token_addr().port()).await;
    send_token(&t2, node.token_addr().port()).await;

    let out_v1 = sink_v1.recv_token().await;
    let out_v2 = sink_v2.recv_token().await;
    assert_eq!(out_v1.sequence_id(), SequenceId(1_000_000));
    assert_eq!(out_v1.service.service_name, "TerminateOne");
    assert_eq!(out_v2.sequence_id(), SequenceId(2_000_000));
    assert_eq!(out_v2.service.service_name, "TerminateTwo");
    assert_eq!(
        out_v1.payload["triageResults"]["patient"],
        out_v2.payload["triageResults"]["patient"]
    );

    node.shutdown().await;
}

#[tokio::test]
async fn rule_install_over_udp_commits_and_acks() {
    let sink = Sink::bind().await;
    let (node, _dir) = start_node(
        "Triage",
        "triage-s6b",
        10,
        110,
        "v001",
        &[],
        &["processTriageAssessment"],
    )
    .await;

    // Local-mode ACKs land on the fixed commitment port.
    let ack_listener = UdpSocket::bind("127.0.0.1:30000").await.expect("bind ack port");

    let bundle = routed_bundle("processTriageAssessment", &sink, "Terminate");
    let packet = RuleInstallPacket {
        header: RuleInstallHeader {
            rule_base_version: "v003".into(),
            rule_base_commitment: true,
        },
        target_service: TargetService {
            service_name: "Triage".into(),
            operation_name: "processTriageAssessment".into(),
        },
        rule_file_data: RuleFileData { data: bundle.to_text().expect("text") },
    };
    let sender = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    sender
        .send_to(&serde_json::to_vec(&packet).expect("encode"), ("127.0.0.1", node.rule_addr().port()))
        .await
        .expect("send install");

    let mut buf = [0_u8; 256];
    let (len, _) = tokio::time::timeout(RECV_TIMEOUT, ack_listener.recv_from(&mut buf))
        .await
        .expect("ack timed out")
        .expect("ack receive");
    let ack = CommitmentAck::parse(std::str::from_utf8(&buf[..len]).expect("utf8"))
        .expect("parse ack");
    assert_eq!(ack.version, "v003");
    assert_eq!(ack.count, 1);

    // The freshly committed version carries traffic immediately.
    let generator = EventGenerator::new(3, 30_000);
    let token = generator
        .mint("Triage", "processTriageAssessment", json!({"fresh": true}))
        .expect("mint");
    send_token(&token, node.token_addr().port()).await;
    let out = sink.recv_token().await;
    assert_eq!(out.sequence_id(), SequenceId(3_000_000));

    node.shutdown().await;
}
