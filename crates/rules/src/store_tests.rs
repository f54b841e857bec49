// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bundle::{RouteTarget, RuleBundle};

fn bundle(service: &str, operation: &str, arity: usize) -> RuleBundle {
    RuleBundle {
        service: service.into(),
        operation: operation.into(),
        guard: None,
        routes: vec![RouteTarget {
            service: "Next".into(),
            operation: "next".into(),
            channel: "ip0".into(),
            port: 0,
        }],
        arity,
    }
}

#[test]
fn accepts_requires_the_full_triple() {
    let store = RuleStore::new();
    store.commit("v001", bundle("Triage", "processTriageAssessment", 1));

    assert!(store.accepts("v001", "Triage", "processTriageAssessment"));
    assert!(!store.accepts("v002", "Triage", "processTriageAssessment"));
    assert!(!store.accepts("v001", "Radiology", "processTriageAssessment"));
    assert!(!store.accepts("v001", "Triage", "somethingElse"));
}

#[test]
fn versions_are_isolated() {
    let store = RuleStore::new();
    store.commit("v001", bundle("Triage", "op", 1));
    store.commit("v002", bundle("Triage", "op", 3));

    assert_eq!(store.required_arity("v001", "op"), 1);
    assert_eq!(store.required_arity("v002", "op"), 3);
    let mut versions = store.committed_versions();
    versions.sort();
    assert_eq!(versions, vec!["v001", "v002"]);
}

#[test]
fn commit_returns_operation_count_for_the_ack() {
    let store = RuleStore::new();
    assert_eq!(store.commit("v001", bundle("S", "op1", 1)), 1);
    assert_eq!(store.commit("v001", bundle("S", "op2", 1)), 2);
    // Reinstall of the same operation replaces, not grows.
    assert_eq!(store.commit("v001", bundle("S", "op2", 2)), 2);
}

#[test]
fn unknown_arity_defaults_to_one() {
    let store = RuleStore::new();
    assert_eq!(store.required_arity("v009", "nope"), 1);
}

#[test]
fn bundle_path_layout() {
    let path = RuleStore::bundle_path(Path::new("/state"), "v001", "collectAssessment", "Assessment");
    assert_eq!(
        path,
        Path::new("/state/RuleFolder.v001/collectAssessment/Assessment-ControlNodeRules.ruleml.xml")
    );
}

#[test]
fn persist_then_reload_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let b = bundle("Assessment", "collectAssessment", 3);
    let text = b.to_text().unwrap();
    RuleStore::persist(dir.path(), "v001", &b.operation, &b.service, &text).unwrap();

    let store = RuleStore::new();
    let loaded = store.reload(dir.path()).unwrap();
    assert_eq!(loaded, 1);
    assert!(store.accepts("v001", "Assessment", "collectAssessment"));
    assert_eq!(store.required_arity("v001", "collectAssessment"), 3);
}

#[test]
fn reload_of_missing_root_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = RuleStore::new();
    assert_eq!(store.reload(&dir.path().join("nope")).unwrap(), 0);
}

#[test]
fn reload_rejects_malformed_bundle_text() {
    let dir = tempfile::tempdir().unwrap();
    RuleStore::persist(dir.path(), "v001", "op", "S", "not a bundle").unwrap();
    let store = RuleStore::new();
    assert!(matches!(store.reload(dir.path()), Err(RuleStoreError::Parse { .. })));
}
