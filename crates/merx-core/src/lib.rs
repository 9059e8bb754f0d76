//! # merx-core
//!
//! Shared types for the Merx commerce action core:
//!
//! - the closed action vocabulary ([`Platform`], [`ActionType`], parameter schemas)
//! - raw and validated shapes ([`ActionDraft`]/[`Action`], [`PlanDraft`]/[`Plan`])
//! - the structural [`Validator`], the only producer of validated shapes
//! - intents, constraints, outcome records and the external response shapes
//! - YAML configuration ([`MerxConfig`])

pub mod action;
pub mod config;
pub mod error;
pub mod intent;
pub mod plan;
pub mod response;
pub mod result;
pub mod validator;
pub mod vocabulary;

pub use action::{Action, ActionDraft, ActionType, Platform, UnknownVariant};
pub use config::{
    ConfigError, ConnectorConfig, ConnectorMode, ExecutionConfig, ExecutionMode,
    ForbiddenCombinationConfig, MerxConfig, PlannerConfig, PolicyConfig,
};
pub use error::{ValidationError, ValidationErrorKind};
pub use intent::{Constraints, Intent, IntentContext};
pub use plan::{Plan, PlanDraft};
pub use response::{ExecutionRequest, ExecutionResponse, PlanResponse};
pub use result::{ActionError, ActionErrorKind, ActionResult, ExecutionResult};
pub use validator::Validator;
pub use vocabulary::{ParamKind, ParameterSpec, VOCABULARY_VERSION};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_valid(schema_src: &str, instance: &serde_json::Value) {
        let schema: serde_json::Value = serde_json::from_str(schema_src).expect("schema must parse");
        let validator = jsonschema::draft202012::options()
            .build(&schema)
            .expect("schema must compile");

        if !validator.is_valid(instance) {
            let mut msgs = Vec::new();
            for (idx, err) in validator.iter_errors(instance).take(20).enumerate() {
                msgs.push(format!("{}: {}", idx + 1, err));
            }
            panic!("instance did not validate: {}", msgs.join("; "));
        }
    }

    fn sample_plan() -> Plan {
        let draft = PlanDraft::new("sample")
            .with_metadata("compiler", "test")
            .with_action(
                ActionDraft::of(Platform::Whop, ActionType::ListPayments).param("limit", 10),
            )
            .with_action(
                ActionDraft::of(Platform::Discord, ActionType::GrantAccess)
                    .param("user_id", "user_1")
                    .param("resource_id", "res_1")
                    .idempotency_key("sample:1"),
            );
        Validator::new().validate_plan(&draft).expect("sample plan must validate")
    }

    #[test]
    fn plan_serialization_validates_against_schema() {
        let instance = serde_json::to_value(sample_plan()).expect("plan must serialize");
        assert_valid(include_str!("../../../schemas/Plan.schema.json"), &instance);
    }

    #[test]
    fn execution_result_serialization_validates_against_schema() {
        let plan = sample_plan();
        let now = chrono::Utc::now();
        let results = vec![
            ActionResult::success(&plan.actions()[0], json!({"items": []})),
            ActionResult::failure(
                &plan.actions()[1],
                ActionErrorKind::UnregisteredPlatform,
                "no connector registered for platform 'discord'",
            ),
        ];
        let result = ExecutionResult::completed(plan.id(), results, now, now);
        let instance = serde_json::to_value(&result).expect("result must serialize");
        assert_valid(include_str!("../../../schemas/ExecutionResult.schema.json"), &instance);

        let rejected = ExecutionResult::rejected("p", &[ValidationError::empty_plan()], now);
        let instance = serde_json::to_value(&rejected).expect("result must serialize");
        assert_valid(include_str!("../../../schemas/ExecutionResult.schema.json"), &instance);
    }
}
