//! Audit sink implementations.
//!
//! Records the lifecycle of every invocation (scheduled, dispatched,
//! completed, failed, cancelled) for inspection by embedding code and tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::task::InvocationId;
use crate::util::clock::now_ms;

/// Audit event structure.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Rendered invocation id.
    pub invocation_id: String,
    /// Task body name.
    pub task: String,
    /// `period` or `delay`.
    pub kind: String,
    /// Action taken (scheduled, dispatched, completed, failed, cancelled).
    pub action: String,
    /// Milliseconds since the Unix epoch (UTC).
    pub created_at_ms: i64,
    /// Additional context.
    pub payload: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// Sink shared between the scheduler and whoever inspects it afterwards.
impl<S: AuditSink> AuditSink for Arc<Mutex<S>> {
    fn record(&mut self, event: AuditEvent) {
        self.lock().record(event);
    }
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }

    /// Events recorded for `task` with the given action.
    #[must_use]
    pub fn count(&self, task: &str, action: &str) -> usize {
        self.events
            .iter()
            .filter(|e| e.task == task && e.action == action)
            .count()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Helper to build an audit event for an invocation.
pub fn build_audit_event(
    id: &InvocationId,
    action: impl Into<String>,
    payload: Option<String>,
) -> AuditEvent {
    AuditEvent {
        invocation_id: id.to_string(),
        task: id.task().to_string(),
        kind: id.kind().to_string(),
        action: action.into(),
        created_at_ms: now_ms(),
        payload,
    }
}
