//! Audit boundary.
//!
//! The engine hands every dispatch and every execution outcome to an
//! [`AuditSink`]. Persisting them is left to whoever implements the sink.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use merx_core::{ActionErrorKind, ActionResult, ActionType, ExecutionResult, Platform};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// One action reached a terminal result.
    ActionCompleted {
        plan_id: String,
        index: usize,
        platform: Platform,
        action: ActionType,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_kind: Option<ActionErrorKind>,
        replayed: bool,
        at: DateTime<Utc>,
    },
    /// A plan finished executing.
    ExecutionCompleted {
        plan_id: String,
        success: bool,
        actions: usize,
        failed: usize,
        duration_ms: u64,
    },
    /// A plan failed re-validation and nothing was dispatched.
    ExecutionRejected {
        plan_id: String,
        errors: Vec<String>,
    },
}

impl AuditEvent {
    pub fn action(plan_id: &str, index: usize, result: &ActionResult) -> Self {
        AuditEvent::ActionCompleted {
            plan_id: plan_id.to_string(),
            index,
            platform: result.action().platform(),
            action: result.action().action_type(),
            success: result.is_success(),
            error_kind: result.error_kind(),
            replayed: result.is_replay(),
            at: result.executed_at(),
        }
    }

    pub fn execution(result: &ExecutionResult) -> Self {
        if result.error.is_some() {
            return AuditEvent::ExecutionRejected {
                plan_id: result.plan_id.clone(),
                errors: result.validation_errors.clone(),
            };
        }
        AuditEvent::ExecutionCompleted {
            plan_id: result.plan_id.clone(),
            success: result.success,
            actions: result.results.len(),
            failed: result.failed_count(),
            duration_ms: result.duration_ms,
        }
    }

    pub fn plan_id(&self) -> &str {
        match self {
            AuditEvent::ActionCompleted { plan_id, .. }
            | AuditEvent::ExecutionCompleted { plan_id, .. }
            | AuditEvent::ExecutionRejected { plan_id, .. } => plan_id,
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Emits audit events as structured `tracing` records under the
/// `merx::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match &event {
            AuditEvent::ActionCompleted {
                plan_id,
                index,
                platform,
                action,
                success,
                error_kind,
                replayed,
                ..
            } => tracing::info!(
                target: "merx::audit",
                plan_id = %plan_id,
                index = index,
                platform = %platform,
                action = %action,
                success = success,
                error_kind = error_kind.map(|k| k.to_string()).unwrap_or_default(),
                replayed = replayed,
                "Action completed"
            ),
            AuditEvent::ExecutionCompleted {
                plan_id,
                success,
                actions,
                failed,
                duration_ms,
            } => tracing::info!(
                target: "merx::audit",
                plan_id = %plan_id,
                success = success,
                actions = actions,
                failed = failed,
                duration_ms = duration_ms,
                "Execution completed"
            ),
            AuditEvent::ExecutionRejected { plan_id, errors } => tracing::info!(
                target: "merx::audit",
                plan_id = %plan_id,
                errors = errors.len(),
                "Execution rejected"
            ),
        }
    }
}

/// Keeps events in memory, for tests and embedding callers that forward them
/// elsewhere.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merx_core::{ActionDraft, Validator};
    use serde_json::json;

    #[test]
    fn action_event_serializes_with_tag() {
        let action = Validator::new()
            .validate_action(&ActionDraft::of(Platform::Whop, ActionType::ListPayments))
            .unwrap();
        let result = ActionResult::failure(&action, ActionErrorKind::Timeout, "late");
        let event = AuditEvent::action("plan-1", 3, &result);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "action_completed");
        assert_eq!(value["index"], 3);
        assert_eq!(value["error_kind"], "timeout");
        assert_eq!(event.plan_id(), "plan-1");
    }

    #[test]
    fn memory_sink_keeps_order() {
        let sink = MemoryAuditSink::new();
        for id in ["a", "b"] {
            sink.record(AuditEvent::ExecutionRejected {
                plan_id: id.to_string(),
                errors: vec![],
            });
        }
        let ids: Vec<String> = sink.events().iter().map(|e| e.plan_id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(json!(sink.events()[0])["event"], "execution_rejected");
    }
}
