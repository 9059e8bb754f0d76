//! The planner: compile, validate, gate.

use std::sync::Arc;

use merx_core::{Constraints, Intent, MerxConfig, Plan, PlanDraft, PlanResponse, Validator};
use merx_policy::PolicyPipeline;

use crate::compiler::{Compiler, RuleCompiler};
use crate::error::PlanningError;

/// Turns intents into executable plans.
///
/// Whatever the compiler returns goes through the same validation and policy
/// gates as a plan submitted out-of-band; the compiler is never trusted.
pub struct Planner {
    compiler: Arc<dyn Compiler>,
    validator: Validator,
    gates: PolicyPipeline,
    default_constraints: Constraints,
}

impl Planner {
    /// A planner with the standard gates and no default constraints.
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            validator: Validator::new(),
            gates: PolicyPipeline::default(),
            default_constraints: Constraints::unconstrained(),
        }
    }

    /// Rule-based planner configured from `planner` and `policy` settings.
    pub fn from_config(config: &MerxConfig) -> Self {
        let compiler = RuleCompiler::new(config.planner.default_platform);
        Self::new(Arc::new(compiler))
            .with_gates(PolicyPipeline::from_config(&config.policy))
            .with_default_constraints(config.planner.default_constraints.clone())
    }

    pub fn with_gates(mut self, gates: PolicyPipeline) -> Self {
        self.gates = gates;
        self
    }

    /// Constraints merged (stricter wins) into every request's constraints.
    pub fn with_default_constraints(mut self, constraints: Constraints) -> Self {
        self.default_constraints = constraints;
        self
    }

    pub fn compiler_name(&self) -> &str {
        self.compiler.name()
    }

    pub fn gates(&self) -> &PolicyPipeline {
        &self.gates
    }

    /// Compile `intent` and run the result through validation and the gates.
    pub async fn plan_from_prompt(&self, intent: &Intent) -> Result<Plan, PlanningError> {
        tracing::debug!(compiler = %self.compiler.name(), prompt = %intent.prompt, "Compiling intent");

        let draft = self
            .compiler
            .compile(intent)
            .await
            .map_err(PlanningError::Compilation)?;

        let constraints = intent.constraints.clone().unwrap_or_default();
        self.validate_existing_plan(&draft, &constraints)
    }

    /// Validate and gate a plan that did not come from this planner's compiler.
    pub fn validate_existing_plan(
        &self,
        draft: &PlanDraft,
        constraints: &Constraints,
    ) -> Result<Plan, PlanningError> {
        let plan = self.validator.validate_plan(draft).inspect_err(|errors| {
            tracing::info!(
                plan_id = %draft.id,
                errors = errors.len(),
                "Plan failed validation"
            );
        })?;

        let effective = self.default_constraints.merge_stricter(constraints);
        self.gates.check(&plan, &effective)?;

        tracing::info!(
            plan_id = %plan.id(),
            actions = plan.len(),
            "Plan accepted"
        );
        Ok(plan)
    }

    /// [`plan_from_prompt`](Self::plan_from_prompt) in the plan-generation
    /// response shape.
    pub async fn generate(&self, intent: &Intent) -> PlanResponse {
        match self.plan_from_prompt(intent).await {
            Ok(plan) => PlanResponse::accepted(plan),
            Err(err) => err.into(),
        }
    }

    /// [`validate_existing_plan`](Self::validate_existing_plan) in the
    /// plan-generation response shape.
    pub fn review(&self, draft: &PlanDraft, constraints: &Constraints) -> PlanResponse {
        match self.validate_existing_plan(draft, constraints) {
            Ok(plan) => PlanResponse::accepted(plan),
            Err(err) => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use merx_core::{ActionDraft, ActionType, Platform};
    use merx_policy::PolicyErrorKind;

    /// Returns a fixed draft regardless of the prompt.
    struct Canned(PlanDraft);

    #[async_trait]
    impl Compiler for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn compile(&self, _intent: &Intent) -> anyhow::Result<PlanDraft> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl Compiler for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn compile(&self, _intent: &Intent) -> anyhow::Result<PlanDraft> {
            anyhow::bail!("upstream unavailable")
        }
    }

    fn rule_planner() -> Planner {
        Planner::new(Arc::new(RuleCompiler::default()))
    }

    #[tokio::test]
    async fn plans_last_ten_payments() {
        let intent = Intent::new("list the last 10 payments").with_platform(Platform::Whop);
        let plan = rule_planner().plan_from_prompt(&intent).await.unwrap();
        assert_eq!(plan.len(), 1);
        let action = &plan.actions()[0];
        assert_eq!(action.platform(), Platform::Whop);
        assert_eq!(action.action_type(), ActionType::ListPayments);
        assert_eq!(action.parameter("limit"), Some(&serde_json::json!(10)));
    }

    #[tokio::test]
    async fn size_gate_sees_untruncated_plan() {
        let prompt = vec!["list payments"; 15].join("; ");
        let intent =
            Intent::new(prompt).with_constraints(Constraints::unconstrained().with_max_actions(10));
        let err = rule_planner().plan_from_prompt(&intent).await.unwrap_err();
        match err {
            PlanningError::Policy(policy) => {
                assert_eq!(policy.gate, "size");
                assert_eq!(policy.kind, PolicyErrorKind::TooManyActions);
            }
            other => panic!("expected policy rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn grant_and_revoke_same_target_is_rejected() {
        let intent = Intent::new(
            "grant user_1 access to res_1; revoke access for user_1 to res_1",
        );
        let err = rule_planner().plan_from_prompt(&intent).await.unwrap_err();
        let PlanningError::Policy(policy) = err else {
            panic!("expected policy rejection");
        };
        assert_eq!(policy.gate, "forbidden_combination");
        assert_eq!(policy.action_indices, vec![0, 1]);
    }

    #[tokio::test]
    async fn compiler_output_is_revalidated() {
        let bad = PlanDraft::new("bad").with_action(ActionDraft::new("myspace", "list_payments"));
        let planner = Planner::new(Arc::new(Canned(bad)));
        let err = planner.plan_from_prompt(&Intent::new("anything")).await.unwrap_err();
        assert!(matches!(err, PlanningError::Validation(ref errors) if errors.len() == 1));
    }

    #[tokio::test]
    async fn compiler_failure_is_reported() {
        let planner = Planner::new(Arc::new(Broken));
        let response = planner.generate(&Intent::new("list payments")).await;
        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("compiler failed: upstream unavailable")
        );
    }

    #[tokio::test]
    async fn default_constraints_merge_stricter() {
        let planner = rule_planner().with_default_constraints(
            Constraints::unconstrained().with_allowed_platforms([Platform::Whop]),
        );
        let intent = Intent::new("list payments on stripe");
        let err = planner.plan_from_prompt(&intent).await.unwrap_err();
        let PlanningError::Policy(policy) = err else {
            panic!("expected policy rejection");
        };
        assert_eq!(policy.gate, "platform_allow_list");
    }

    #[test]
    fn existing_plans_pass_the_same_gates() {
        let draft = PlanDraft::new("out of band")
            .with_action(ActionDraft::of(Platform::Stripe, ActionType::ListPayments))
            .with_action(ActionDraft::of(Platform::Stripe, ActionType::ListSubscriptions));
        let planner = rule_planner();

        let plan = planner
            .validate_existing_plan(&draft, &Constraints::unconstrained())
            .unwrap();
        assert_eq!(plan.id(), draft.id);

        let response = planner.review(&draft, &Constraints::unconstrained().with_max_actions(1));
        assert!(!response.success);
        assert_eq!(response.validation_errors.map(|v| v.len()), Some(1));
    }

    #[test]
    fn from_config_uses_configured_defaults() {
        let config = MerxConfig::from_yaml(
            "planner:\n  default_platform: stripe\n  default_constraints:\n    maxActions: 2\n",
        )
        .unwrap();
        let planner = Planner::from_config(&config);
        assert_eq!(planner.compiler_name(), "rule_based");
        assert_eq!(
            planner.gates().gate_names(),
            vec!["size", "platform_allow_list", "forbidden_combination"]
        );
    }
}
