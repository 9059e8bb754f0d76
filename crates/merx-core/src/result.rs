//! Per-action and per-execution outcome records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::action::Action;
use crate::error::ValidationError;

/// Why a single action failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionErrorKind {
    /// The platform integration failed for this action.
    Connector,
    /// No connector is registered for the action's platform.
    UnregisteredPlatform,
    /// The registered connector does not handle this action type.
    UnsupportedAction,
    /// The plan's execution budget ran out before the action completed.
    Timeout,
}

impl fmt::Display for ActionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionErrorKind::Connector => "connector",
            ActionErrorKind::UnregisteredPlatform => "unregistered_platform",
            ActionErrorKind::UnsupportedAction => "unsupported_action",
            ActionErrorKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// Structured error attached to a failed [`ActionResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionError {
    pub kind: ActionErrorKind,
    pub message: String,
}

/// Outcome of one action. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    action: Action,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ActionError>,
    executed_at: DateTime<Utc>,
    /// Served from the idempotency store instead of a new dispatch.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    replayed: bool,
}

impl ActionResult {
    /// A successful outcome carrying the platform's response data.
    pub fn success(action: &Action, data: Value) -> Self {
        Self {
            action: action.clone(),
            success: true,
            data: Some(data),
            error: None,
            executed_at: Utc::now(),
            replayed: false,
        }
    }

    /// A failed outcome.
    pub fn failure(action: &Action, kind: ActionErrorKind, message: impl Into<String>) -> Self {
        Self {
            action: action.clone(),
            success: false,
            data: None,
            error: Some(ActionError {
                kind,
                message: message.into(),
            }),
            executed_at: Utc::now(),
            replayed: false,
        }
    }

    /// The same outcome, marked as replayed from an earlier execution.
    pub fn into_replay(self) -> Self {
        Self {
            replayed: true,
            ..self
        }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ActionError> {
        self.error.as_ref()
    }

    pub fn error_kind(&self) -> Option<ActionErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn executed_at(&self) -> DateTime<Utc> {
        self.executed_at
    }

    pub fn is_replay(&self) -> bool {
        self.replayed
    }
}

/// Outcome of one execution attempt of a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub plan_id: String,
    /// True iff every action result succeeded.
    pub success: bool,
    /// One result per plan action, in the plan's original order.
    pub results: Vec<ActionResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Plan-level rejection reason, when the plan never reached a connector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

impl ExecutionResult {
    /// Aggregate per-action results already in plan order.
    pub fn completed(
        plan_id: impl Into<String>,
        results: Vec<ActionResult>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            success: results.iter().all(ActionResult::is_success),
            results,
            started_at,
            completed_at,
            duration_ms: duration_ms(started_at, completed_at),
            error: None,
            validation_errors: Vec::new(),
        }
    }

    /// A plan that failed re-validation: no action was dispatched.
    pub fn rejected(
        plan_id: impl Into<String>,
        errors: &[ValidationError],
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            plan_id: plan_id.into(),
            success: false,
            results: Vec::new(),
            started_at,
            completed_at,
            duration_ms: duration_ms(started_at, completed_at),
            error: Some("Plan failed validation before execution".to_string()),
            validation_errors: errors.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}

fn duration_ms(started_at: DateTime<Utc>, completed_at: DateTime<Utc>) -> u64 {
    u64::try_from((completed_at - started_at).num_milliseconds()).unwrap_or(0)
}
