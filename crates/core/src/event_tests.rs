// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn events_serialize_with_type_tag() {
    let event = Event::TokenAdmitted {
        sequence_id: SequenceId(1_000_000),
        service: "Triage".into(),
        operation: "processTriageAssessment".into(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "token:admitted");
    assert_eq!(json["sequence_id"], 1_000_000);
}

#[test]
fn events_round_trip() {
    let event = Event::JoinCompleted {
        join_node: "Assessment".into(),
        parent: SequenceId(1_000_000),
        survivor: SequenceId(1_000_000),
        consumed: vec![SequenceId(1_000_002), SequenceId(1_000_003)],
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn monitor_class_covers_flow_events_only() {
    let admitted = Event::TokenAdmitted {
        sequence_id: SequenceId(1),
        service: "s".into(),
        operation: "o".into(),
    };
    let expired = Event::TokenExpired { sequence_id: SequenceId(1), not_after: 1, now: 2 };
    let queue_full = Event::QueueFull { sequence_id: SequenceId(1), capacity: 8 };
    assert!(admitted.is_monitor_class());
    assert!(!expired.is_monitor_class());
    assert!(!queue_full.is_monitor_class());
}

#[test]
fn summaries_name_the_sequence_id() {
    let event = Event::TokenTerminated { sequence_id: SequenceId(42) };
    assert!(event.summary().contains("42"));
}
