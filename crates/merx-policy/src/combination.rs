//! Forbidden action combinations.

use merx_core::{Action, ActionType, ForbiddenCombinationConfig};

/// Two action types that must not appear together against the same target.
///
/// The target is the platform plus the values of `target_keys`. With no
/// target keys, any two actions of these types on one platform conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForbiddenCombination {
    pub name: String,
    pub first: ActionType,
    pub second: ActionType,
    pub target_keys: Vec<String>,
}

impl ForbiddenCombination {
    pub fn new(
        name: impl Into<String>,
        first: ActionType,
        second: ActionType,
        target_keys: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            first,
            second,
            target_keys: target_keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Granting and revoking access to the same resource in one plan,
    /// whichever users the two actions name.
    pub fn grant_revoke_same_target() -> Self {
        Self::new(
            "grant_revoke_same_target",
            ActionType::GrantAccess,
            ActionType::RevokeAccess,
            ["resource_id"],
        )
    }

    /// Rules every planner starts with.
    pub fn defaults() -> Vec<Self> {
        vec![Self::grant_revoke_same_target()]
    }

    /// First pair of positions `(i, j)` with `i < j` that violates the rule.
    pub fn find_conflict(&self, actions: &[Action]) -> Option<(usize, usize)> {
        for (i, a) in actions.iter().enumerate() {
            for (j, b) in actions.iter().enumerate().skip(i + 1) {
                if self.pairs(a, b) && self.same_target(a, b) {
                    return Some((i, j));
                }
            }
        }
        None
    }

    fn pairs(&self, a: &Action, b: &Action) -> bool {
        let (ta, tb) = (a.action_type(), b.action_type());
        (ta == self.first && tb == self.second) || (ta == self.second && tb == self.first)
    }

    fn same_target(&self, a: &Action, b: &Action) -> bool {
        a.platform() == b.platform()
            && self.target_keys.iter().all(|key| {
                match (a.parameter(key), b.parameter(key)) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                }
            })
    }
}

impl From<&ForbiddenCombinationConfig> for ForbiddenCombination {
    fn from(config: &ForbiddenCombinationConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.first,
            config.second,
            config.target_keys.iter().cloned(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merx_core::{ActionDraft, Platform, Validator};

    fn action(draft: ActionDraft) -> Action {
        Validator::new().validate_action(&draft).unwrap()
    }

    fn grant(platform: Platform, user: &str) -> Action {
        action(
            ActionDraft::of(platform, ActionType::GrantAccess)
                .param("user_id", user)
                .param("resource_id", "res_1"),
        )
    }

    fn revoke(platform: Platform, user: &str) -> Action {
        action(
            ActionDraft::of(platform, ActionType::RevokeAccess)
                .param("user_id", user)
                .param("resource_id", "res_1"),
        )
    }

    #[test]
    fn order_of_the_pair_does_not_matter() {
        let rule = ForbiddenCombination::grant_revoke_same_target();
        let actions = vec![revoke(Platform::Whop, "u1"), grant(Platform::Whop, "u1")];
        assert_eq!(rule.find_conflict(&actions), Some((0, 1)));
    }

    #[test]
    fn same_resource_conflicts_across_users() {
        let rule = ForbiddenCombination::grant_revoke_same_target();
        let actions = vec![grant(Platform::Whop, "u1"), revoke(Platform::Whop, "u2")];
        assert_eq!(rule.find_conflict(&actions), Some((0, 1)));
    }

    #[test]
    fn different_platforms_are_different_targets() {
        let rule = ForbiddenCombination::grant_revoke_same_target();
        let actions = vec![grant(Platform::Whop, "u1"), revoke(Platform::Discord, "u1")];
        assert_eq!(rule.find_conflict(&actions), None);
    }

    #[test]
    fn same_type_rule_matches_repeated_actions() {
        let rule = ForbiddenCombination::new(
            "double_grant",
            ActionType::GrantAccess,
            ActionType::GrantAccess,
            ["user_id"],
        );
        let actions = vec![grant(Platform::Whop, "u1"), grant(Platform::Whop, "u1")];
        assert_eq!(rule.find_conflict(&actions), Some((0, 1)));
        let single = vec![grant(Platform::Whop, "u1")];
        assert_eq!(rule.find_conflict(&single), None);
    }

    #[test]
    fn converts_from_config() {
        let config = ForbiddenCombinationConfig {
            name: "x".into(),
            first: ActionType::CancelSubscription,
            second: ActionType::GrantAccess,
            target_keys: vec![],
        };
        let rule = ForbiddenCombination::from(&config);
        assert_eq!(rule.name, "x");
        assert!(rule.target_keys.is_empty());
    }
}
