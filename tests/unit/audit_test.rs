//! Tests for audit sink

use std::sync::Arc;

use parking_lot::Mutex;
use periodic_exporter_scheduler::core::{build_audit_event, AuditSink, InMemoryAuditSink, InvocationId, TaskKind};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let id = InvocationId::new(TaskKind::Periodic, "stats_pools");

    let event = build_audit_event(&id, "scheduled", Some("2024-03-09 10:01:00".to_string()));
    sink.record(event);
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0].invocation_id, id.to_string());
    assert_eq!(events[0].task, "stats_pools");
    assert_eq!(events[0].kind, "period");
    assert_eq!(events[0].action, "scheduled");
}

#[test]
fn test_in_memory_audit_sink_is_bounded() {
    let mut sink = InMemoryAuditSink::new(2);
    let id = InvocationId::new(TaskKind::Delayed, "bootstrap");

    for action in ["scheduled", "dispatched", "completed"] {
        sink.record(build_audit_event(&id, action, None));
    }

    let actions: Vec<_> = sink.events().into_iter().map(|e| e.action).collect();
    assert_eq!(actions, vec!["dispatched", "completed"]);
    assert_eq!(sink.count("bootstrap", "scheduled"), 0);
}

#[test]
fn test_shared_audit_sink() {
    let shared = Arc::new(Mutex::new(InMemoryAuditSink::new(10)));
    let mut writer = Arc::clone(&shared);
    let id = InvocationId::new(TaskKind::Periodic, "heartbeat");

    writer.record(build_audit_event(&id, "failed", Some("boom".to_string())));
    assert_eq!(shared.lock().count("heartbeat", "failed"), 1);
}

#[test]
fn test_audit_timestamp_is_epoch_millis() {
    let before = chrono::Utc::now().timestamp_millis();
    let event = build_audit_event(&InvocationId::new(TaskKind::Delayed, "bootstrap"), "scheduled", None);
    let after = chrono::Utc::now().timestamp_millis();

    assert!(event.created_at_ms >= before);
    assert!(event.created_at_ms <= after);
}
