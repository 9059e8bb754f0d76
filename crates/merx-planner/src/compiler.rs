//! Intent compilers.
//!
//! A compiler turns an [`Intent`] into a [`PlanDraft`]. It is untrusted: the
//! planner validates and gates whatever it returns, so an external
//! language-model compiler can be slotted in behind the same trait.

use async_trait::async_trait;
use merx_core::{ActionDraft, ActionType, Intent, Platform, PlanDraft};
use serde_json::{Value, json};

use crate::rules::{self, Clause};

#[async_trait]
pub trait Compiler: Send + Sync {
    /// Recorded in plan metadata as `compiler`.
    fn name(&self) -> &str;

    async fn compile(&self, intent: &Intent) -> anyhow::Result<PlanDraft>;
}

/// Deterministic keyword compiler.
///
/// Never truncates to `maxActions` and never returns an empty plan: when no
/// clause matches a rule it emits a single `list_payments` action and marks
/// the plan with `fallback: true`.
#[derive(Debug, Clone)]
pub struct RuleCompiler {
    default_platform: Platform,
}

impl RuleCompiler {
    pub const NAME: &'static str = "rule_based";

    pub fn new(default_platform: Platform) -> Self {
        Self { default_platform }
    }

    pub fn default_platform(&self) -> Platform {
        self.default_platform
    }

    /// Platform for one clause: the hint, then the clause, then the prompt,
    /// then a single-entry allow-list, then the configured default.
    fn resolve_platform(
        &self,
        intent: &Intent,
        clause: Option<&Clause>,
        prompt_mention: Option<Platform>,
    ) -> Platform {
        if let Some(hint) = intent.platform_hint() {
            return hint;
        }
        if let Some(named) = clause.and_then(Clause::platform).or(prompt_mention) {
            return named;
        }
        let allowed = intent
            .constraints
            .as_ref()
            .and_then(|c| c.allowed_platforms.as_deref());
        match allowed {
            Some([only]) => *only,
            _ => self.default_platform,
        }
    }

    fn build(&self, intent: &Intent) -> PlanDraft {
        let clauses = rules::clauses(&intent.prompt);
        let prompt_mention = clauses.iter().find_map(Clause::platform);
        let context = intent.context.as_ref().map(|c| &c.values);

        let mut actions = Vec::new();
        for clause in &clauses {
            let Some(action_type) = rules::classify(clause) else {
                tracing::debug!(clause = %clause.text(), "No rule matched clause");
                continue;
            };
            let platform = self.resolve_platform(intent, Some(clause), prompt_mention);
            let params = rules::infer_parameters(action_type, clause, context);
            tracing::debug!(
                clause = %clause.text(),
                action = %action_type,
                platform = %platform,
                "Clause compiled"
            );
            let draft = ActionDraft {
                parameters: Value::Object(params),
                ..ActionDraft::of(platform, action_type)
            };
            actions.push((action_type, draft));
        }

        let fallback = actions.is_empty();
        if fallback {
            let platform = self.resolve_platform(intent, None, prompt_mention);
            let action_type = ActionType::ListPayments;
            actions.push((action_type, ActionDraft::of(platform, action_type)));
        }

        let constraints = intent.constraints.clone().unwrap_or_default();
        let mut draft = PlanDraft::new(intent.prompt.trim())
            .with_metadata("compiler", self.name())
            .with_metadata("compilerVersion", env!("CARGO_PKG_VERSION"))
            .with_metadata("prompt", intent.prompt.as_str())
            .with_metadata("constraints", json!(constraints))
            .with_metadata("fallback", fallback);

        for (index, (action_type, mut action)) in actions.into_iter().enumerate() {
            if action_type.is_mutating() {
                action.idempotency_key = Some(format!("{}:{}", draft.id, index));
            }
            draft.actions.push(action);
        }
        draft
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new(Platform::Whop)
    }
}

#[async_trait]
impl Compiler for RuleCompiler {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn compile(&self, intent: &Intent) -> anyhow::Result<PlanDraft> {
        let draft = self.build(intent);
        let fallback = draft
            .metadata
            .get("fallback")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        tracing::info!(
            plan_id = %draft.id,
            actions = draft.actions.len(),
            fallback = fallback,
            "Intent compiled"
        );
        Ok(draft)
    }
}
