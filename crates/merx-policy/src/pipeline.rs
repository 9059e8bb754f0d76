//! Ordered gate pipeline.

use merx_core::{Constraints, Plan, PolicyConfig};

use crate::combination::ForbiddenCombination;
use crate::error::PolicyError;
use crate::gates::{ForbiddenCombinationGate, PlatformAllowListGate, PolicyGate, SizeGate};

/// Runs gates in a fixed order; the first rejection is authoritative and
/// later gates are not evaluated.
///
/// The standard order is `size`, `platform_allow_list`, `forbidden_combination`.
pub struct PolicyPipeline {
    gates: Vec<Box<dyn PolicyGate>>,
}

impl PolicyPipeline {
    /// A pipeline with no gates.
    pub fn empty() -> Self {
        Self { gates: Vec::new() }
    }

    /// The standard gates, with the given forbidden combinations.
    pub fn standard(combinations: Vec<ForbiddenCombination>) -> Self {
        Self::empty()
            .with_gate(SizeGate)
            .with_gate(PlatformAllowListGate)
            .with_gate(ForbiddenCombinationGate::new(combinations))
    }

    /// The standard gates configured from `policy` settings.
    pub fn from_config(config: &PolicyConfig) -> Self {
        let mut combinations = if config.include_default_combinations {
            ForbiddenCombination::defaults()
        } else {
            Vec::new()
        };
        combinations.extend(
            config
                .forbidden_combinations
                .iter()
                .map(ForbiddenCombination::from),
        );
        Self::standard(combinations)
    }

    /// Append a gate; it runs after every gate already present.
    pub fn with_gate(mut self, gate: impl PolicyGate + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    pub fn gate_names(&self) -> Vec<&str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    pub fn check(&self, plan: &Plan, constraints: &Constraints) -> Result<(), PolicyError> {
        for gate in &self.gates {
            if let Err(err) = gate.check(plan, constraints) {
                tracing::info!(
                    plan_id = %plan.id(),
                    gate = %gate.name(),
                    reason = %err.message,
                    "Plan rejected by policy gate"
                );
                return Err(err);
            }
            tracing::debug!(plan_id = %plan.id(), gate = %gate.name(), "Policy gate passed");
        }
        Ok(())
    }
}

impl Default for PolicyPipeline {
    fn default() -> Self {
        Self::standard(ForbiddenCombination::defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyErrorKind;
    use merx_core::{ActionDraft, ActionType, ForbiddenCombinationConfig, Platform, PlanDraft, Validator};

    struct RejectAll;

    impl PolicyGate for RejectAll {
        fn name(&self) -> &str {
            "reject_all"
        }

        fn check(&self, _plan: &Plan, _constraints: &Constraints) -> Result<(), PolicyError> {
            Err(PolicyError::new("reject_all", PolicyErrorKind::Custom, "nope"))
        }
    }

    fn plan(count: usize, platform: Platform) -> Plan {
        let draft = (0..count).fold(PlanDraft::new("p"), |d, _| {
            d.with_action(ActionDraft::of(platform, ActionType::ListPayments))
        });
        Validator::new().validate_plan(&draft).unwrap()
    }

    #[test]
    fn standard_order_is_documented_order() {
        assert_eq!(
            PolicyPipeline::default().gate_names(),
            vec!["size", "platform_allow_list", "forbidden_combination"]
        );
    }

    #[test]
    fn first_failing_gate_wins() {
        // Violates both size and allow-list; size runs first.
        let constraints = Constraints::unconstrained()
            .with_max_actions(1)
            .with_allowed_platforms([Platform::Whop]);
        let err = PolicyPipeline::default()
            .check(&plan(3, Platform::Stripe), &constraints)
            .unwrap_err();
        assert_eq!(err.gate, "size");
    }

    #[test]
    fn custom_gates_run_last() {
        let pipeline = PolicyPipeline::default().with_gate(RejectAll);
        assert_eq!(pipeline.gate_names().last(), Some(&"reject_all"));
        let err = pipeline
            .check(&plan(1, Platform::Whop), &Constraints::unconstrained())
            .unwrap_err();
        assert_eq!(err.kind, PolicyErrorKind::Custom);
    }

    #[test]
    fn config_can_drop_default_combinations() {
        let config = PolicyConfig {
            include_default_combinations: false,
            forbidden_combinations: vec![ForbiddenCombinationConfig {
                name: "no_double_list".into(),
                first: ActionType::ListPayments,
                second: ActionType::ListPayments,
                target_keys: vec![],
            }],
        };
        let pipeline = PolicyPipeline::from_config(&config);
        let err = pipeline
            .check(&plan(2, Platform::Whop), &Constraints::unconstrained())
            .unwrap_err();
        assert!(err.message.contains("no_double_list"));
    }
}
