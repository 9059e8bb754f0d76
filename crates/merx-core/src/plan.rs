//! Plans: ordered sequences of actions with identity and provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::action::{Action, ActionDraft, Platform};
use crate::vocabulary::VOCABULARY_VERSION;

/// A validated, read-only plan.
///
/// Produced only by [`Validator::validate_plan`]. Execution never mutates a
/// plan; it produces a separate `ExecutionResult`.
///
/// [`Validator::validate_plan`]: crate::validator::Validator::validate_plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    id: String,
    description: String,
    created_at: DateTime<Utc>,
    vocabulary_version: String,
    metadata: Map<String, Value>,
    actions: Vec<Action>,
}

impl Plan {
    pub(crate) fn new(
        id: String,
        description: String,
        created_at: DateTime<Utc>,
        vocabulary_version: String,
        metadata: Map<String, Value>,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            id,
            description,
            created_at,
            vocabulary_version,
            metadata,
            actions,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn vocabulary_version(&self) -> &str {
        &self.vocabulary_version
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Distinct platforms referenced by the plan.
    pub fn platforms(&self) -> BTreeSet<Platform> {
        self.actions.iter().map(Action::platform).collect()
    }
}

/// A plan as emitted by a compiler or submitted out-of-band, not yet validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDraft {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vocabulary_version: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub actions: Vec<ActionDraft>,
}

impl PlanDraft {
    /// Start an empty draft with a fresh id under the current vocabulary.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            created_at: Utc::now(),
            vocabulary_version: Some(VOCABULARY_VERSION.to_string()),
            metadata: Map::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: ActionDraft) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl From<&Plan> for PlanDraft {
    fn from(plan: &Plan) -> Self {
        Self {
            id: plan.id.clone(),
            description: plan.description.clone(),
            created_at: plan.created_at,
            vocabulary_version: Some(plan.vocabulary_version.clone()),
            metadata: plan.metadata.clone(),
            actions: plan.actions.iter().map(ActionDraft::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_written_draft_gets_defaults() {
        let draft: PlanDraft = serde_json::from_str(
            r#"{"actions":[{"platform":"whop","type":"list_payments","parameters":{"limit":5}}]}"#,
        )
        .unwrap();
        assert!(draft.id.is_empty());
        assert!(draft.vocabulary_version.is_none());
        assert_eq!(draft.actions.len(), 1);
    }

    #[test]
    fn new_draft_has_identity_and_version() {
        let draft = PlanDraft::new("demo");
        assert!(!draft.id.is_empty());
        assert_eq!(draft.vocabulary_version.as_deref(), Some(VOCABULARY_VERSION));
        assert!(draft.actions.is_empty());
    }
}
