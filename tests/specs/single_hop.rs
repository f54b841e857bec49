// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One edge node: ingest, invoke, enrich, route to terminate.

use crate::helpers::*;
use serde_json::json;
use tf_core::SequenceId;
use tf_node::EventGenerator;

#[tokio::test]
async fn single_hop_enriches_and_routes_to_terminate() {
    let sink = Sink::bind().await;
    let bundle = edge_bundle("Triage", "processTriageAssessment", &sink);
    let (node, _dir) = start_node(
        "Triage",
        "triage-s1",
        1,
        101,
        "v001",
        &[bundle],
        &["processTriageAssessment"],
    )
    .await;

    let generator = EventGenerator::new(1, 30_000);
    let token = generator
        .mint("Triage", "processTriageAssessment", json!({"x": 1}))
        .expect("mint");
    assert_eq!(token.sequence_id(), SequenceId(1_000_000));
    let raw = send_token(&token, node.token_addr().port()).await;

    let out = sink.recv_token().await;
    assert_eq!(out.sequence_id(), SequenceId(1_000_000));
    assert_eq!(out.service.service_name, "Terminate");
    assert_eq!(out.monitor_data.calling_service, "Triage");

    let results = &out.payload["triageResults"];
    assert_eq!(results["original_token"].as_str().expect("original"), raw);
    assert_eq!(results["x"], 1);
    assert!(results["service_processing_time_ms"].as_u64().expect("timing") < 5_000);
    assert!(results["workflow_start_time"].as_u64().is_some());

    node.shutdown().await;
}

#[tokio::test]
async fn foreign_service_tokens_are_filtered_silently() {
    let sink = Sink::bind().await;
    let bundle = edge_bundle("Triage", "processTriageAssessment", &sink);
    let (node, _dir) = start_node(
        "Triage",
        "triage-s1b",
        8,
        108,
        "v001",
        &[bundle],
        &["processTriageAssessment"],
    )
    .await;

    let generator = EventGenerator::new(1, 30_000);
    let token = generator
        .mint("Radiology", "processTriageAssessment", json!({}))
        .expect("mint");
    send_token(&token, node.token_addr().port()).await;

    sink.expect_nothing(std::time::Duration::from_millis(400)).await;
    assert_eq!(node.counters().snapshot().version_rejected, 0);
    node.shutdown().await;
}
