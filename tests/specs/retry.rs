// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry edge: a failing guard re-admits the token until it passes.

use crate::helpers::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tf_core::{SequenceId, Token};
use tf_node::EventGenerator;
use tf_rules::{GuardRule, RouteTarget, RuleBundle, RuleEngine};

/// Guard that fails a fixed number of evaluations before passing.
struct EventuallyTrue {
    failures_left: AtomicUsize,
    evaluations: AtomicUsize,
}

impl RuleEngine for EventuallyTrue {
    fn guard(&self, _: &Token, _: &RuleBundle) -> bool {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        self.failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_err()
    }

    fn route(&self, _: &Token, bundle: &RuleBundle) -> Vec<RouteTarget> {
        bundle.routes.clone()
    }

    fn required_arity(&self, bundle: &RuleBundle) -> usize {
        bundle.arity
    }
}

#[tokio::test]
async fn guard_retries_twice_then_publishes_once() {
    let sink = Sink::bind().await;
    let mut bundle = edge_bundle("Triage", "processTriageAssessment", &sink);
    bundle.guard = Some(GuardRule {
        field: "status".into(),
        equals: "true".into(),
        retry: true,
    });
    let engine = Arc::new(EventuallyTrue {
        failures_left: AtomicUsize::new(2),
        evaluations: AtomicUsize::new(0),
    });
    let (node, _dir) = start_node_with_engine(
        "Triage",
        "triage-s2",
        2,
        102,
        "v001",
        &[bundle],
        &["processTriageAssessment"],
        engine.clone(),
    )
    .await;

    let generator = EventGenerator::new(1, 30_000);
    let token = generator
        .mint("Triage", "processTriageAssessment", json!({"attempt": "s2"}))
        .expect("mint");
    send_token(&token, node.token_addr().port()).await;

    // Exactly one publication downstream, same sequence id throughout.
    let out = sink.recv_token().await;
    assert_eq!(out.sequence_id(), SequenceId(1_000_000));
    assert_eq!(out.payload["triageResults"]["attempt"], "s2");

    // Three pipeline passes: two failed guards, one success.
    eventually("three guard evaluations", || {
        engine.evaluations.load(Ordering::SeqCst) == 3
    })
    .await;
    sink.expect_nothing(std::time::Duration::from_millis(300)).await;

    node.shutdown().await;
}

#[tokio::test]
async fn guard_without_retry_absorbs_the_token() {
    let sink = Sink::bind().await;
    let mut bundle = edge_bundle("Triage", "processTriageAssessment", &sink);
    bundle.guard = Some(GuardRule {
        field: "status".into(),
        equals: "true".into(),
        retry: false,
    });
    let engine = Arc::new(EventuallyTrue {
        failures_left: AtomicUsize::new(usize::MAX),
        evaluations: AtomicUsize::new(0),
    });
    let (node, _dir) = start_node_with_engine(
        "Triage",
        "triage-s2b",
        9,
        109,
        "v001",
        &[bundle],
        &["processTriageAssessment"],
        engine,
    )
    .await;

    let generator = EventGenerator::new(1, 30_000);
    let token = generator
        .mint("Triage", "processTriageAssessment", json!({}))
        .expect("mint");
    send_token(&token, node.token_addr().port()).await;

    eventually("guard absorption", || node.counters().snapshot().guard_absorbed == 1).await;
    sink.expect_nothing(std::time::Duration::from_millis(300)).await;
    node.shutdown().await;
}
