//! Plan execution.
//!
//! The engine re-validates a plan, partitions it into platform groups,
//! dispatches each group to its registered connector and reassembles the
//! results in the plan's original order.
//!
//! Every dispatch is isolated: a connector error, a panic or an unsupported
//! action becomes a failed [`ActionResult`] for that action alone. A batch
//! that panics is retried one action at a time. The whole run shares one
//! deadline; once it passes, the pending action and every action not yet
//! dispatched fail with `timeout`.
//!
//! A keyed action holds its idempotency key from before dispatch until its
//! result is known, so concurrent submissions of it dispatch once.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::join_all;
use merx_core::{
    Action, ActionErrorKind, ActionResult, ExecutionConfig, ExecutionMode, ExecutionRequest,
    ExecutionResponse, ExecutionResult, Plan, PlanDraft, Platform, Validator,
};
use tokio::time::Instant;

use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::connector::{Connector, ConnectorError};
use crate::idempotency::{IdempotencyCheck, IdempotencyStore, Reservation};
use crate::registry::ConnectorRegistry;

/// Actions of one platform, in plan order, with their plan positions.
struct PlatformGroup<'a> {
    platform: Platform,
    entries: Vec<(usize, &'a Action)>,
}

/// Partition actions by platform, keeping first-appearance order of
/// platforms and original order within each group.
fn group_by_platform(actions: &[Action]) -> Vec<PlatformGroup<'_>> {
    let mut groups: Vec<PlatformGroup<'_>> = Vec::new();
    for (index, action) in actions.iter().enumerate() {
        match groups.iter_mut().find(|g| g.platform == action.platform()) {
            Some(group) => group.entries.push((index, action)),
            None => groups.push(PlatformGroup {
                platform: action.platform(),
                entries: vec![(index, action)],
            }),
        }
    }
    groups
}

/// Outcome of one bounded call into a connector.
enum Dispatch<T> {
    Done(T),
    Panicked(String),
    TimedOut,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn panic_failure(action: &Action, message: &str) -> ActionResult {
    ActionResult::failure(
        action,
        ActionErrorKind::Connector,
        format!("connector panicked: {message}"),
    )
}

/// Run a synchronous connector call, turning a panic into its message.
fn guarded<T>(call: impl FnOnce() -> T) -> Result<T, String> {
    std::panic::catch_unwind(AssertUnwindSafe(call))
        .map_err(|payload| panic_message(payload.as_ref()))
}

/// Whether an action goes to the connector or already has its result.
enum Admission<'a> {
    Dispatch(Option<Reservation<'a>>),
    Resolved(ActionResult),
}

fn timeout_failure(action: &Action) -> ActionResult {
    ActionResult::failure(
        action,
        ActionErrorKind::Timeout,
        "execution timeout budget exhausted before the action completed",
    )
}

pub struct ExecutionEngine {
    registry: Arc<ConnectorRegistry>,
    validator: Validator,
    idempotency: Arc<IdempotencyStore>,
    audit: Arc<dyn AuditSink>,
    mode: ExecutionMode,
    timeout: Duration,
}

impl ExecutionEngine {
    /// Sequential execution with the default timeout budget.
    pub fn new(registry: Arc<ConnectorRegistry>) -> Self {
        Self::from_config(registry, &ExecutionConfig::default())
    }

    pub fn from_config(registry: Arc<ConnectorRegistry>, config: &ExecutionConfig) -> Self {
        Self {
            registry,
            validator: Validator::new(),
            idempotency: Arc::new(IdempotencyStore::with_ttl(config.idempotency_ttl())),
            audit: Arc::new(TracingAuditSink),
            mode: config.mode,
            timeout: config.timeout(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Overall budget for one plan execution.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Share an idempotency store with other engines.
    pub fn with_idempotency_store(mut self, store: Arc<IdempotencyStore>) -> Self {
        self.idempotency = store;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    pub fn idempotency_store(&self) -> &IdempotencyStore {
        &self.idempotency
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Execute a plan. It is re-validated first, since time may have passed
    /// since it was planned.
    pub async fn execute(&self, plan: &Plan) -> ExecutionResult {
        self.execute_draft(&PlanDraft::from(plan)).await
    }

    /// Validate and execute a plan received from outside this process.
    pub async fn execute_draft(&self, draft: &PlanDraft) -> ExecutionResult {
        let started_at = Utc::now();

        let plan = match self.validator.validate_plan(draft) {
            Ok(plan) => plan,
            Err(errors) => {
                tracing::warn!(
                    plan_id = %draft.id,
                    errors = errors.len(),
                    "Plan rejected before execution"
                );
                let result = ExecutionResult::rejected(draft.id.clone(), &errors, started_at);
                self.audit.record(AuditEvent::execution(&result));
                return result;
            }
        };

        let groups = group_by_platform(plan.actions());
        tracing::info!(
            plan_id = %plan.id(),
            actions = plan.len(),
            groups = groups.len(),
            mode = ?self.mode,
            "Executing plan"
        );

        let deadline = Instant::now() + self.timeout;
        let outcomes: Vec<Vec<(usize, ActionResult)>> = match self.mode {
            ExecutionMode::Sequential => {
                let mut outcomes = Vec::with_capacity(groups.len());
                for group in &groups {
                    outcomes.push(self.run_group(plan.id(), group, deadline).await);
                }
                outcomes
            }
            ExecutionMode::Concurrent => {
                join_all(
                    groups
                        .iter()
                        .map(|group| self.run_group(plan.id(), group, deadline)),
                )
                .await
            }
        };

        let mut slots: Vec<Option<ActionResult>> = vec![None; plan.len()];
        for (index, result) in outcomes.into_iter().flatten() {
            slots[index] = Some(result);
        }
        let results: Vec<ActionResult> = slots
            .into_iter()
            .zip(plan.actions())
            .map(|(slot, action)| {
                slot.unwrap_or_else(|| {
                    ActionResult::failure(action, ActionErrorKind::Connector, "no result recorded")
                })
            })
            .collect();

        let result = ExecutionResult::completed(plan.id(), results, started_at, Utc::now());
        tracing::info!(
            plan_id = %result.plan_id,
            success = result.success,
            failed = result.failed_count(),
            duration_ms = result.duration_ms,
            "Plan execution finished"
        );
        self.audit.record(AuditEvent::execution(&result));
        result
    }

    /// The plan-execution operation in its external request/response shape.
    pub async fn execute_request(&self, request: &ExecutionRequest) -> ExecutionResponse {
        self.execute_draft(&request.plan).await.into()
    }

    async fn run_group(
        &self,
        plan_id: &str,
        group: &PlatformGroup<'_>,
        deadline: Instant,
    ) -> Vec<(usize, ActionResult)> {
        let results = match self.registry.get(group.platform) {
            None => {
                tracing::warn!(
                    plan_id = %plan_id,
                    platform = %group.platform,
                    actions = group.entries.len(),
                    "No connector registered for platform"
                );
                group
                    .entries
                    .iter()
                    .map(|&(index, action)| {
                        let message =
                            format!("no connector registered for platform '{}'", group.platform);
                        let kind = ActionErrorKind::UnregisteredPlatform;
                        (index, ActionResult::failure(action, kind, message))
                    })
                    .collect()
            }
            Some(connector) => match guarded(|| connector.metadata().batch_execution) {
                Ok(true) => self.run_batch(&connector, group, deadline).await,
                Ok(false) => self.run_each(&connector, group, deadline).await,
                Err(message) => {
                    tracing::error!(
                        plan_id = %plan_id,
                        platform = %group.platform,
                        panic = %message,
                        "Connector panicked while describing itself"
                    );
                    group
                        .entries
                        .iter()
                        .map(|&(index, action)| (index, panic_failure(action, &message)))
                        .collect()
                }
            },
        };

        for (index, result) in &results {
            self.audit.record(AuditEvent::action(plan_id, *index, result));
        }
        results
    }

    /// Resolve everything that does not need a dispatch (unsupported types,
    /// replays, key conflicts) and otherwise reserve the action's key.
    async fn admit(
        &self,
        connector: &dyn Connector,
        action: &Action,
        deadline: Instant,
    ) -> Admission<'_> {
        match guarded(|| connector.supports_action(action.action_type())) {
            Ok(true) => {}
            Ok(false) => {
                return Admission::Resolved(ActionResult::failure(
                    action,
                    ActionErrorKind::UnsupportedAction,
                    format!(
                        "{} connector does not support {}",
                        action.platform(),
                        action.action_type()
                    ),
                ));
            }
            Err(message) => {
                tracing::error!(
                    platform = %action.platform(),
                    action = %action.action_type(),
                    panic = %message,
                    "Connector panicked while checking support"
                );
                return Admission::Resolved(panic_failure(action, &message));
            }
        }

        // Waiting on another holder of the key counts against the budget.
        let check = match tokio::time::timeout_at(deadline, self.idempotency.acquire(action)).await
        {
            Ok(check) => check,
            Err(_) => return Admission::Resolved(timeout_failure(action)),
        };

        match check {
            IdempotencyCheck::Unkeyed => Admission::Dispatch(None),
            IdempotencyCheck::Reserved(reservation) => Admission::Dispatch(Some(reservation)),
            IdempotencyCheck::Replay(result) => {
                tracing::debug!(
                    platform = %action.platform(),
                    action = %action.action_type(),
                    "Replaying stored result for idempotency key"
                );
                Admission::Resolved(result.into_replay())
            }
            IdempotencyCheck::Conflict { key } => {
                let err = ConnectorError::IdempotencyKeyReuse {
                    platform: action.platform(),
                    key,
                };
                Admission::Resolved(ActionResult::failure(
                    action,
                    ActionErrorKind::Connector,
                    err.to_string(),
                ))
            }
        }
    }

    /// One isolated `execute_action` call under the shared deadline.
    async fn dispatch_one(
        &self,
        connector: &Arc<dyn Connector>,
        action: &Action,
        deadline: Instant,
    ) -> ActionResult {
        if Instant::now() >= deadline {
            return timeout_failure(action);
        }

        let call = AssertUnwindSafe(connector.execute_action(action)).catch_unwind();
        match bounded(deadline, call).await {
            Dispatch::Done(Ok(result)) => result,
            Dispatch::Done(Err(err)) => {
                tracing::debug!(
                    platform = %action.platform(),
                    action = %action.action_type(),
                    error = %err,
                    "Connector returned an error"
                );
                ActionResult::failure(action, ActionErrorKind::Connector, err.to_string())
            }
            Dispatch::Panicked(message) => {
                tracing::error!(
                    platform = %action.platform(),
                    action = %action.action_type(),
                    panic = %message,
                    "Connector panicked"
                );
                panic_failure(action, &message)
            }
            Dispatch::TimedOut => {
                tracing::warn!(
                    platform = %action.platform(),
                    action = %action.action_type(),
                    "Execution timeout reached"
                );
                timeout_failure(action)
            }
        }
    }

    async fn run_each(
        &self,
        connector: &Arc<dyn Connector>,
        group: &PlatformGroup<'_>,
        deadline: Instant,
    ) -> Vec<(usize, ActionResult)> {
        let mut results = Vec::with_capacity(group.entries.len());

        for &(index, action) in &group.entries {
            if Instant::now() >= deadline {
                results.push((index, timeout_failure(action)));
                continue;
            }
            let result = match self.admit(connector.as_ref(), action, deadline).await {
                Admission::Resolved(result) => result,
                Admission::Dispatch(reservation) => {
                    let result = self.dispatch_one(connector, action, deadline).await;
                    settle(reservation, &result);
                    result
                }
            };
            results.push((index, result));
        }
        results
    }

    async fn run_batch(
        &self,
        connector: &Arc<dyn Connector>,
        group: &PlatformGroup<'_>,
        deadline: Instant,
    ) -> Vec<(usize, ActionResult)> {
        let mut results = Vec::with_capacity(group.entries.len());
        let mut pending = Vec::new();
        let mut deferred = Vec::new();
        let mut keys = HashSet::new();

        for &(index, action) in &group.entries {
            // A repeated key would wait on this batch's own reservation; it
            // runs after the batch and replays.
            if action.idempotency_key().is_some_and(|key| !keys.insert(key)) {
                deferred.push((index, action));
                continue;
            }
            if Instant::now() >= deadline {
                results.push((index, timeout_failure(action)));
                continue;
            }
            match self.admit(connector.as_ref(), action, deadline).await {
                Admission::Resolved(result) => results.push((index, result)),
                Admission::Dispatch(reservation) => pending.push((index, action, reservation)),
            }
        }

        if !pending.is_empty() {
            let actions: Vec<Action> = pending.iter().map(|(_, a, _)| (*a).clone()).collect();
            let outcome = if Instant::now() >= deadline {
                Dispatch::TimedOut
            } else {
                let call = AssertUnwindSafe(connector.execute_actions(&actions)).catch_unwind();
                bounded(deadline, call).await
            };

            match outcome {
                Dispatch::Done(batch) => {
                    let mut batch = batch.into_iter();
                    for (index, action, reservation) in pending {
                        let result = batch.next().unwrap_or_else(|| {
                            ActionResult::failure(
                                action,
                                ActionErrorKind::Connector,
                                "connector returned fewer results than actions",
                            )
                        });
                        settle(reservation, &result);
                        results.push((index, result));
                    }
                }
                Dispatch::Panicked(message) => {
                    // The batch's partial results are lost with the panic.
                    // Keyed and read-only actions are safe to send again one
                    // at a time; an unkeyed mutation may already have happened.
                    tracing::error!(
                        platform = %group.platform,
                        panic = %message,
                        "Connector panicked during batch, dispatching actions one at a time"
                    );
                    for (index, action, reservation) in pending {
                        let result = if action.action_type().is_mutating()
                            && action.idempotency_key().is_none()
                        {
                            ActionResult::failure(
                                action,
                                ActionErrorKind::Connector,
                                format!(
                                    "connector panicked during batch: {message}; unkeyed action not retried"
                                ),
                            )
                        } else {
                            self.dispatch_one(connector, action, deadline).await
                        };
                        settle(reservation, &result);
                        results.push((index, result));
                    }
                }
                Dispatch::TimedOut => {
                    tracing::warn!(platform = %group.platform, "Execution timeout reached");
                    for (index, action, _) in pending {
                        results.push((index, timeout_failure(action)));
                    }
                }
            }
        }

        if !deferred.is_empty() {
            let rest = PlatformGroup {
                platform: group.platform,
                entries: deferred,
            };
            results.extend(self.run_each(connector, &rest, deadline).await);
        }

        results.sort_by_key(|(index, _)| *index);
        results
    }
}

fn settle(reservation: Option<Reservation<'_>>, result: &ActionResult) {
    if let Some(reservation) = reservation {
        reservation.complete(result);
    }
}

/// Run a panic-guarded connector call under the shared deadline.
async fn bounded<F, T>(deadline: Instant, call: F) -> Dispatch<T>
where
    F: Future<Output = std::thread::Result<T>>,
{
    match tokio::time::timeout_at(deadline, call).await {
        Ok(Ok(value)) => Dispatch::Done(value),
        Ok(Err(payload)) => Dispatch::Panicked(panic_message(payload.as_ref())),
        Err(_) => Dispatch::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merx_core::{ActionDraft, ActionType};

    fn actions(platforms: &[Platform]) -> Vec<Action> {
        platforms
            .iter()
            .map(|p| {
                Validator::new()
                    .validate_action(&ActionDraft::of(*p, ActionType::ListPayments))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn groups_keep_intra_platform_order() {
        let actions = actions(&[
            Platform::Whop,
            Platform::Stripe,
            Platform::Whop,
            Platform::Email,
            Platform::Stripe,
        ]);
        let groups = group_by_platform(&actions);
        let layout: Vec<(Platform, Vec<usize>)> = groups
            .iter()
            .map(|g| (g.platform, g.entries.iter().map(|(i, _)| *i).collect()))
            .collect();
        assert_eq!(
            layout,
            vec![
                (Platform::Whop, vec![0, 2]),
                (Platform::Stripe, vec![1, 4]),
                (Platform::Email, vec![3]),
            ]
        );
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
