//! Request/response shapes handed to collaborators (UI, HTTP layer, audit store).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::{Plan, PlanDraft};
use crate::result::{ActionResult, ExecutionResult};

/// Outcome of plan generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Vec<String>>,
}

impl PlanResponse {
    pub fn accepted(plan: Plan) -> Self {
        Self {
            success: true,
            plan: Some(plan),
            error: None,
            validation_errors: None,
        }
    }

    pub fn rejected(error: impl Into<String>, validation_errors: Vec<String>) -> Self {
        Self {
            success: false,
            plan: None,
            error: Some(error.into()),
            validation_errors: Some(validation_errors),
        }
    }
}

/// Input of plan execution: any object with the plan shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub plan: PlanDraft,
}

/// Outcome of plan execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    pub plan_id: String,
    pub success: bool,
    pub results: Vec<ActionResult>,
    pub executed_at: DateTime<Utc>,
    /// Milliseconds.
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

impl From<ExecutionResult> for ExecutionResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            plan_id: result.plan_id,
            success: result.success,
            results: result.results,
            executed_at: result.started_at,
            duration: result.duration_ms,
            error: result.error,
            validation_errors: result.validation_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_response_uses_external_field_names() {
        let response = PlanResponse::rejected("policy gate 'size' rejected the plan", vec![
            "too many actions".to_string(),
        ]);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["validationErrors"][0], "too many actions");
        assert!(value.get("plan").is_none());
    }

    #[test]
    fn execution_request_accepts_plan_shape() {
        let request: ExecutionRequest = serde_json::from_str(
            r#"{"plan":{"id":"p1","actions":[{"platform":"whop","type":"list_payments"}]}}"#,
        )
        .unwrap();
        assert_eq!(request.plan.id, "p1");
    }
}
