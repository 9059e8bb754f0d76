//! Built-in policy gates.
//!
//! A gate is a named, pure predicate over a validated plan and the effective
//! constraints. Gates never modify the plan.

use merx_core::{Constraints, Plan};

use crate::combination::ForbiddenCombination;
use crate::error::PolicyError;

/// A named check a plan must pass before it is considered executable.
pub trait PolicyGate: Send + Sync {
    /// Stable gate name, reported in rejections.
    fn name(&self) -> &str;

    fn check(&self, plan: &Plan, constraints: &Constraints) -> Result<(), PolicyError>;
}

/// Rejects plans with more actions than `maxActions`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeGate;

impl SizeGate {
    pub const NAME: &'static str = "size";
}

impl PolicyGate for SizeGate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, plan: &Plan, constraints: &Constraints) -> Result<(), PolicyError> {
        match constraints.max_actions {
            Some(max) if plan.len() > max => {
                Err(PolicyError::too_many_actions(Self::NAME, plan.len(), max))
            }
            _ => Ok(()),
        }
    }
}

/// Rejects plans touching a platform outside an explicit allow-list.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformAllowListGate;

impl PlatformAllowListGate {
    pub const NAME: &'static str = "platform_allow_list";
}

impl PolicyGate for PlatformAllowListGate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, plan: &Plan, constraints: &Constraints) -> Result<(), PolicyError> {
        let Some(allowed) = &constraints.allowed_platforms else {
            return Ok(());
        };

        let offending: Vec<usize> = plan
            .actions()
            .iter()
            .enumerate()
            .filter(|(_, action)| !allowed.contains(&action.platform()))
            .map(|(index, _)| index)
            .collect();

        let Some(&first) = offending.first() else {
            return Ok(());
        };

        let allowed_names: Vec<String> = allowed.iter().map(|p| p.to_string()).collect();
        Err(PolicyError::platform_not_allowed(
            Self::NAME,
            plan.actions()[first].platform().as_str(),
            &allowed_names,
        )
        .with_actions(offending))
    }
}

/// Rejects plans containing an unsafe pairing of actions.
#[derive(Debug, Clone)]
pub struct ForbiddenCombinationGate {
    rules: Vec<ForbiddenCombination>,
}

impl ForbiddenCombinationGate {
    pub const NAME: &'static str = "forbidden_combination";

    pub fn new(rules: Vec<ForbiddenCombination>) -> Self {
        Self { rules }
    }

    /// The built-in rules only.
    pub fn with_defaults() -> Self {
        Self::new(ForbiddenCombination::defaults())
    }

    pub fn with_rule(mut self, rule: ForbiddenCombination) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ForbiddenCombination] {
        &self.rules
    }
}

impl Default for ForbiddenCombinationGate {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PolicyGate for ForbiddenCombinationGate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check(&self, plan: &Plan, _constraints: &Constraints) -> Result<(), PolicyError> {
        for rule in &self.rules {
            if let Some((first, second)) = rule.find_conflict(plan.actions()) {
                return Err(PolicyError::forbidden_combination(
                    Self::NAME,
                    &rule.name,
                    first,
                    second,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyErrorKind;
    use merx_core::{ActionDraft, ActionType, Platform, PlanDraft, Validator};

    fn plan_of(actions: Vec<ActionDraft>) -> Plan {
        let draft = actions
            .into_iter()
            .fold(PlanDraft::new("test"), PlanDraft::with_action);
        Validator::new().validate_plan(&draft).unwrap()
    }

    fn list(platform: Platform) -> ActionDraft {
        ActionDraft::of(platform, ActionType::ListPayments)
    }

    fn access(action_type: ActionType, user: &str, resource: &str) -> ActionDraft {
        ActionDraft::of(Platform::Whop, action_type)
            .param("user_id", user)
            .param("resource_id", resource)
    }

    #[test]
    fn size_gate_rejects_over_limit() {
        let plan = plan_of((0..15).map(|_| list(Platform::Whop)).collect());
        let constraints = Constraints::unconstrained().with_max_actions(10);
        let err = SizeGate.check(&plan, &constraints).unwrap_err();
        assert_eq!(err.gate, "size");
        assert_eq!(err.kind, PolicyErrorKind::TooManyActions);
    }

    #[test]
    fn size_gate_is_unconstrained_by_default() {
        let plan = plan_of((0..50).map(|_| list(Platform::Whop)).collect());
        assert!(SizeGate.check(&plan, &Constraints::unconstrained()).is_ok());
        let exact = Constraints::unconstrained().with_max_actions(50);
        assert!(SizeGate.check(&plan, &exact).is_ok());
    }

    #[test]
    fn allow_list_gate_reports_every_offending_action() {
        let plan = plan_of(vec![
            list(Platform::Whop),
            list(Platform::Stripe),
            list(Platform::Paypal),
        ]);
        let constraints = Constraints::unconstrained().with_allowed_platforms([Platform::Whop]);
        let err = PlatformAllowListGate.check(&plan, &constraints).unwrap_err();
        assert_eq!(err.kind, PolicyErrorKind::PlatformNotAllowed);
        assert_eq!(err.action_indices, vec![1, 2]);
        assert!(err.message.contains("stripe"));
    }

    #[test]
    fn allow_list_gate_skips_without_list() {
        let plan = plan_of(vec![list(Platform::Email)]);
        assert!(
            PlatformAllowListGate
                .check(&plan, &Constraints::unconstrained())
                .is_ok()
        );
    }

    #[test]
    fn grant_and_revoke_on_same_target_is_forbidden() {
        let plan = plan_of(vec![
            access(ActionType::GrantAccess, "user_1", "res_1"),
            list(Platform::Whop),
            access(ActionType::RevokeAccess, "user_1", "res_1"),
        ]);
        let err = ForbiddenCombinationGate::default()
            .check(&plan, &Constraints::unconstrained())
            .unwrap_err();
        assert_eq!(err.kind, PolicyErrorKind::ForbiddenCombination);
        assert_eq!(err.action_indices, vec![0, 2]);
        assert!(err.message.contains("grant_revoke_same_target"));
    }

    #[test]
    fn grant_and_revoke_of_one_resource_for_different_users_is_forbidden() {
        let plan = plan_of(vec![
            access(ActionType::GrantAccess, "user_1", "res_1"),
            access(ActionType::RevokeAccess, "user_2", "res_1"),
        ]);
        let err = ForbiddenCombinationGate::default()
            .check(&plan, &Constraints::unconstrained())
            .unwrap_err();
        assert_eq!(err.kind, PolicyErrorKind::ForbiddenCombination);
        assert_eq!(err.action_indices, vec![0, 1]);
    }

    #[test]
    fn grant_and_revoke_on_different_resources_is_allowed() {
        let plan = plan_of(vec![
            access(ActionType::GrantAccess, "user_1", "res_1"),
            access(ActionType::RevokeAccess, "user_1", "res_2"),
        ]);
        assert!(
            ForbiddenCombinationGate::default()
                .check(&plan, &Constraints::unconstrained())
                .is_ok()
        );
    }

    #[test]
    fn extra_rules_extend_the_gate() {
        let plan = plan_of(vec![
            ActionDraft::of(Platform::Whop, ActionType::CancelSubscription)
                .param("subscription_id", "sub_1"),
            access(ActionType::GrantAccess, "user_1", "res_1"),
        ]);
        let gate = ForbiddenCombinationGate::with_defaults().with_rule(ForbiddenCombination::new(
            "cancel_and_grant",
            ActionType::CancelSubscription,
            ActionType::GrantAccess,
            Vec::<String>::new(),
        ));
        let err = gate.check(&plan, &Constraints::unconstrained()).unwrap_err();
        assert!(err.message.contains("cancel_and_grant"));
    }
}
