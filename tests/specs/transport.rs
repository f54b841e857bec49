// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chunked transfer end to end: an oversize payload crosses the wire in
//! fragments and is admitted as one logical token.

use crate::helpers::*;
use serde_json::json;
use tf_core::SequenceId;
use tf_node::EventGenerator;
use tf_wire::{encode_for_wire, WireOptions, WirePayload};
use tokio::net::UdpSocket;

/// Pseudo-random hex, incompressible enough to stay oversize.
fn noisy_blob(len: usize) -> String {
    (0..len).map(|i| format!("{:x}", (i.wrapping_mul(2654435761)) % 16)).collect()
}

#[tokio::test]
async fn oversize_payload_chunks_across_and_processes_normally() {
    let sink = Sink::bind().await;
    let bundle = edge_bundle("Triage", "processTriageAssessment", &sink);
    let (node, _dir) = start_node(
        "Triage",
        "triage-s5",
        6,
        106,
        "v001",
        &[bundle],
        &["processTriageAssessment"],
    )
    .await;

    let blob = noisy_blob(18_000);
    let generator = EventGenerator::new(1, 30_000);
    let token = generator
        .mint("Triage", "processTriageAssessment", json!({"blob": blob}))
        .expect("mint");

    let opts = WireOptions { max_wire_length: 4096, compression_enabled: false };
    let datagrams = match encode_for_wire(&token, opts).expect("encode") {
        WirePayload::Chunked(datagrams) => datagrams,
        WirePayload::Single(_) => panic!("18KB payload must chunk at the default wire limit"),
    };
    assert!(datagrams.len() >= 5, "expected ~5 chunks, got {}", datagrams.len());

    let sender = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    for datagram in &datagrams {
        sender
            .send_to(datagram, ("127.0.0.1", node.token_addr().port()))
            .await
            .expect("send chunk");
        // The sender-side pacing the publisher would apply.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    // One logical token admitted, processed, and republished (chunked
    // again on the way out; the sink reassembles).
    let out = sink.recv_token().await;
    assert_eq!(out.sequence_id(), SequenceId(1_000_000));
    assert_eq!(out.payload["triageResults"]["blob"].as_str().expect("blob"), blob);

    sink.expect_nothing(std::time::Duration::from_millis(300)).await;
    node.shutdown().await;
}
