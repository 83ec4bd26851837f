//! Orchestrator: drives a research run from start to end
//!
//! The loop asks the [`Router`] for the next step(s), executes them and feeds
//! the result back to the router until it answers `end`. A single next step
//! runs on its own; several run concurrently against the same snapshot and
//! are merged before the convergence step (`reasoning_selection`) runs.
//!
//! Step errors never escape: they are retried under the [`RetryPolicy`] or
//! recorded as a [`WorkflowFailure`] on the returned work item.
//!
//! [`RetryPolicy`]: super::config::RetryPolicy

use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{OrchestratorError, StepError, WorkflowFailure};
use crate::research::state::{ProgressSnapshot, WorkItem};

use super::config::{OrchestratorConfig, RouterConfig};
use super::node::{Step, StepRegistry, REASONING_SELECTION};
use super::router::{increment_retry_count, HaltReason, Router, RoutingDecision};

/// Why a run stopped before its step finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancelled,
    WorkflowTimeout(Duration),
}

impl Interrupt {
    fn failure(self, step: Option<&str>) -> WorkflowFailure {
        match self {
            Interrupt::Cancelled => WorkflowFailure::cancelled(step),
            Interrupt::WorkflowTimeout(budget) => {
                let mut failure = WorkflowFailure::workflow_timeout(budget);
                failure.step = step.map(str::to_string);
                failure
            }
        }
    }
}

/// Result of a single step attempt
enum Attempt {
    Failed(StepError),
    Interrupted(Interrupt),
}

/// Per-run controls shared by every step execution
struct RunContext<'a> {
    cancel: &'a CancellationToken,
    deadline: Option<(Instant, Duration)>,
    progress: Option<&'a watch::Sender<ProgressSnapshot>>,
}

impl RunContext<'_> {
    /// Resolves when the run is cancelled or out of time
    async fn interrupted(&self) -> Interrupt {
        match self.deadline {
            Some((deadline, budget)) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Interrupt::Cancelled,
                _ = sleep_until(deadline) => Interrupt::WorkflowTimeout(budget),
            },
            None => {
                self.cancel.cancelled().await;
                Interrupt::Cancelled
            }
        }
    }

    fn check(&self) -> Option<Interrupt> {
        if self.cancel.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some((deadline, budget)) if Instant::now() >= deadline => {
                Some(Interrupt::WorkflowTimeout(budget))
            }
            _ => None,
        }
    }

    fn publish(&self, state: &WorkItem) {
        if let Some(tx) = self.progress {
            tx.send_replace(state.progress());
        }
    }
}

/// Execution engine for the adaptive research workflow
pub struct Orchestrator {
    registry: Arc<StepRegistry>,
    router: Router,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator.
    ///
    /// The router's iteration budget is taken from `config`. Steps are not
    /// required to be complete here: a step the router names but the
    /// registry lacks fails the run with a routing error.
    pub fn new(
        registry: StepRegistry,
        config: OrchestratorConfig,
        router_config: RouterConfig,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let router =
            Router::new(router_config.with_max_total_iterations(config.max_total_iterations))?;
        Ok(Self {
            registry: Arc::new(registry),
            router,
            config,
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Run a fresh work item to completion
    pub async fn run(
        &self,
        session_id: impl Into<String>,
        query: impl Into<String>,
        user_profile: Value,
        prompt_config: Value,
    ) -> WorkItem {
        let initial = WorkItem::new(session_id, query, user_profile, prompt_config);
        self.drive(initial, &CancellationToken::new(), None).await
    }

    /// Drive `initial` until the router ends the run, the run is cancelled,
    /// or a step fails for good. Progress snapshots are published on
    /// `progress` after every routing decision.
    pub async fn drive(
        &self,
        initial: WorkItem,
        cancel: &CancellationToken,
        progress: Option<&watch::Sender<ProgressSnapshot>>,
    ) -> WorkItem {
        let ctx = RunContext {
            cancel,
            deadline: self
                .config
                .workflow_timeout
                .map(|budget| (Instant::now() + budget, budget)),
            progress,
        };

        info!(
            session_id = %initial.session_id,
            query = %initial.query,
            "Starting research workflow"
        );

        let mut decision = self.router.next(&initial, None);
        loop {
            let is_end = decision.is_end();
            let RoutingDecision { state, next, halt } = decision;
            ctx.publish(&state);

            if let Some(reason) = halt {
                let finished = self.halt(state, reason);
                ctx.publish(&finished);
                return finished;
            }
            if is_end {
                let finished = state.completed();
                info!(
                    session_id = %finished.session_id,
                    iterations = finished.iteration_count(),
                    citations = finished.citations.len(),
                    "Research workflow completed"
                );
                ctx.publish(&finished);
                return finished;
            }
            if let Some(interrupt) = ctx.check() {
                let current = state.bookkeeping().current_step.clone();
                let failed = state.with_error(interrupt.failure(current.as_deref()));
                ctx.publish(&failed);
                return failed;
            }

            let (next_state, finished_step) = match next.as_slice() {
                [single] => {
                    let out = self.execute_named(single, state, &ctx).await;
                    (out, single.clone())
                }
                targets => {
                    let out = self.execute_fan_out(targets, state, &ctx).await;
                    (out, REASONING_SELECTION.to_string())
                }
            };

            if next_state.is_terminal() {
                ctx.publish(&next_state);
                return next_state;
            }
            decision = self.router.next(&next_state, Some(&finished_step));
        }
    }

    fn halt(&self, state: WorkItem, reason: HaltReason) -> WorkItem {
        match reason {
            HaltReason::IterationBudgetExhausted => {
                warn!(
                    session_id = %state.session_id,
                    has_response = state.final_response.is_some(),
                    "Run ended on the iteration budget"
                );
                state.completed()
            }
            other => {
                let current = state.bookkeeping().current_step.clone();
                error!(session_id = %state.session_id, reason = %other, "Routing halted the run");
                state.with_error(WorkflowFailure::routing(current.as_deref(), other.to_string()))
            }
        }
    }

    async fn execute_named(&self, name: &str, state: WorkItem, ctx: &RunContext<'_>) -> WorkItem {
        match self.registry.get(name) {
            Some(step) => self.run_step(step, state, ctx).await,
            None => {
                error!(session_id = %state.session_id, step = %name, "No step registered");
                state.with_error(WorkflowFailure::routing(
                    Some(name),
                    format!("no step registered under '{}'", name),
                ))
            }
        }
    }

    async fn execute_fan_out(
        &self,
        targets: &[String],
        state: WorkItem,
        ctx: &RunContext<'_>,
    ) -> WorkItem {
        let mut steps = Vec::with_capacity(targets.len());
        for name in targets {
            match self.registry.get(name) {
                Some(step) => steps.push(step),
                None => {
                    return state.with_error(WorkflowFailure::routing(
                        Some(name),
                        format!("no step registered under '{}'", name),
                    ))
                }
            }
        }

        info!(session_id = %state.session_id, branches = ?targets, "Running branches concurrently");
        let branches = join_all(
            steps
                .into_iter()
                .map(|step| self.run_step(step, state.clone(), ctx)),
        )
        .await;

        let mut merged = WorkItem::merge_branches(&state, branches);
        for name in targets {
            merged.bookkeeping_mut().visited_steps.insert(name.clone());
        }
        if merged.is_terminal() {
            return merged;
        }
        self.execute_named(REASONING_SELECTION, merged, ctx).await
    }

    /// Execute one step with retries; never returns an error
    async fn run_step(&self, step: Arc<dyn Step>, input: WorkItem, ctx: &RunContext<'_>) -> WorkItem {
        let name = step.name().to_string();
        let mut state = input;
        state.bookkeeping_mut().current_step = Some(name.clone());

        if !step.should_run(&state) {
            debug!(session_id = %state.session_id, step = %name, "Precondition not met, skipping");
            return state;
        }

        // Retries of this invocation; a later invocation starts afresh
        let mut retries = 0;
        loop {
            if self.config.tracing_enabled {
                debug!(
                    session_id = %state.session_id,
                    step = %name,
                    retry = retries,
                    "Executing step"
                );
            }

            let error = match self.attempt(step.as_ref(), &state, ctx).await {
                Ok(output) => return output.with_owned_fields_from(&state),
                Err(Attempt::Interrupted(interrupt)) => {
                    warn!(session_id = %state.session_id, step = %name, ?interrupt, "Step interrupted");
                    return state.with_error(interrupt.failure(Some(&name)));
                }
                Err(Attempt::Failed(error)) => error,
            };

            if !self.config.retry_policy.should_retry(retries, &error) {
                let attempts = retries + 1;
                error!(
                    session_id = %state.session_id,
                    step = %name,
                    attempts,
                    error = %error,
                    "Step failed"
                );
                return state.with_error(WorkflowFailure::from_step_error(&name, &error, attempts));
            }

            let delay = self.config.retry_policy.delay_for_attempt(retries);
            retries += 1;
            increment_retry_count(&mut state, &name);
            warn!(
                session_id = %state.session_id,
                step = %name,
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Step failed, will retry"
            );

            tokio::select! {
                biased;
                interrupt = ctx.interrupted() => {
                    return state.with_error(interrupt.failure(Some(&name)));
                }
                _ = sleep(delay) => {}
            }
        }
    }

    async fn attempt(
        &self,
        step: &dyn Step,
        state: &WorkItem,
        ctx: &RunContext<'_>,
    ) -> Result<WorkItem, Attempt> {
        let step_timeout = self.config.step_timeout;
        tokio::select! {
            biased;
            interrupt = ctx.interrupted() => Err(Attempt::Interrupted(interrupt)),
            result = timeout(step_timeout, step.run(state)) => match result {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(e)) => Err(Attempt::Failed(e)),
                Err(_) => Err(Attempt::Failed(StepError::Timeout(format!(
                    "step '{}' exceeded {:?}",
                    step.name(),
                    step_timeout
                )))),
            },
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::research::state::{FinalResponse, Intent, QueryAnalysis, ReasoningMethod, RunOutcome};
    use crate::workflow::config::RetryPolicy;
    use crate::workflow::node::{CITATION_FETCH, QUERY_ANALYSIS, REASONING_EXECUTION};
    use async_trait::async_trait;

    struct Analyze;

    #[async_trait]
    impl Step for Analyze {
        fn name(&self) -> &str {
            QUERY_ANALYSIS
        }

        async fn run(&self, state: &WorkItem) -> Result<WorkItem, StepError> {
            Ok(state.with_query_analysis(QueryAnalysis::new(Intent::Conversational, 1.0, false)))
        }
    }

    struct Noop(&'static str);

    #[async_trait]
    impl Step for Noop {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, state: &WorkItem) -> Result<WorkItem, StepError> {
            Ok(state.clone())
        }
    }

    struct Select;

    #[async_trait]
    impl Step for Select {
        fn name(&self) -> &str {
            REASONING_SELECTION
        }

        async fn run(&self, state: &WorkItem) -> Result<WorkItem, StepError> {
            Ok(state.with_reasoning(ReasoningMethod::Direct))
        }
    }

    /// Answers, and tries to tamper with bookkeeping and terminal flags
    struct TamperingAnswer;

    #[async_trait]
    impl Step for TamperingAnswer {
        fn name(&self) -> &str {
            REASONING_EXECUTION
        }

        async fn run(&self, state: &WorkItem) -> Result<WorkItem, StepError> {
            let mut out = state.with_response(FinalResponse::new("hi"));
            out.bookkeeping_mut().iteration_count = 0;
            out.bookkeeping_mut().retry_counts.insert("x".into(), 99);
            out.is_complete = true;
            Ok(out)
        }
    }

    struct Slow;

    #[async_trait]
    impl Step for Slow {
        fn name(&self) -> &str {
            QUERY_ANALYSIS
        }

        async fn run(&self, state: &WorkItem) -> Result<WorkItem, StepError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(state.clone())
        }
    }

    fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_step_timeout(Duration::from_millis(50))
            .with_retry_policy(
                RetryPolicy::default()
                    .with_backoff_base(Duration::from_millis(1))
                    .with_backoff_max(Duration::from_millis(2)),
            )
    }

    fn registry(steps: Vec<Arc<dyn Step>>) -> StepRegistry {
        let mut registry = StepRegistry::new();
        for step in steps {
            registry.register(step).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_steps_cannot_alter_bookkeeping() {
        let orchestrator = Orchestrator::new(
            registry(vec![
                Arc::new(Analyze),
                Arc::new(Noop(CITATION_FETCH)),
                Arc::new(Select),
                Arc::new(TamperingAnswer),
            ]),
            fast_config(),
            RouterConfig::default(),
        )
        .unwrap();

        let result = orchestrator.run("s", "hey", Value::Null, Value::Null).await;
        assert_eq!(result.outcome(), RunOutcome::Succeeded);
        assert_eq!(result.retry_count("x"), 0);
        assert_eq!(result.iteration_count(), 4);
    }

    #[tokio::test]
    async fn test_step_timeout_is_retried_then_fails() {
        let orchestrator = Orchestrator::new(
            registry(vec![Arc::new(Slow)]),
            fast_config(),
            RouterConfig::default(),
        )
        .unwrap();

        let result = orchestrator.run("s", "q", Value::Null, Value::Null).await;
        let failure = result.error.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::RetriesExhausted);
        assert_eq!(failure.step.as_deref(), Some(QUERY_ANALYSIS));
        assert_eq!(failure.attempts, 4);
        assert_eq!(result.retry_count(QUERY_ANALYSIS), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let orchestrator = Orchestrator::new(
            registry(vec![Arc::new(Slow)]),
            OrchestratorConfig::default(),
            RouterConfig::default(),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orchestrator
            .drive(WorkItem::for_query("s", "q"), &cancel, None)
            .await;
        assert_eq!(result.error.map(|e| e.kind), Some(FailureKind::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_running_step() {
        let orchestrator = Orchestrator::new(
            registry(vec![Arc::new(Slow)]),
            OrchestratorConfig::default(),
            RouterConfig::default(),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = orchestrator
            .drive(WorkItem::for_query("s", "q"), &cancel, None)
            .await;
        let failure = result.error.clone().unwrap();
        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(failure.step.as_deref(), Some(QUERY_ANALYSIS));
        assert_eq!(result.retry_count(QUERY_ANALYSIS), 0);
        assert!(result.is_terminal());
    }

    #[tokio::test]
    async fn test_workflow_timeout() {
        let orchestrator = Orchestrator::new(
            registry(vec![Arc::new(Slow)]),
            OrchestratorConfig::default().with_workflow_timeout(Duration::from_millis(30)),
            RouterConfig::default(),
        )
        .unwrap();

        let result = orchestrator.run("s", "q", Value::Null, Value::Null).await;
        assert_eq!(result.error.map(|e| e.kind), Some(FailureKind::WorkflowTimeout));
    }

    #[tokio::test]
    async fn test_missing_step_is_routing_failure() {
        let orchestrator = Orchestrator::new(
            registry(vec![Arc::new(Analyze)]),
            fast_config(),
            RouterConfig::default(),
        )
        .unwrap();

        let result = orchestrator.run("s", "q", Value::Null, Value::Null).await;
        let failure = result.error.unwrap();
        assert_eq!(failure.kind, FailureKind::Routing);
        assert_eq!(failure.step.as_deref(), Some(CITATION_FETCH));
    }

    #[tokio::test]
    async fn test_progress_is_published() {
        let orchestrator = Orchestrator::new(
            registry(vec![
                Arc::new(Analyze),
                Arc::new(Noop(CITATION_FETCH)),
                Arc::new(Select),
                Arc::new(TamperingAnswer),
            ]),
            fast_config(),
            RouterConfig::default(),
        )
        .unwrap();
        let initial = WorkItem::for_query("s", "hey");
        let (tx, rx) = watch::channel(initial.progress());

        let result = orchestrator
            .drive(initial, &CancellationToken::new(), Some(&tx))
            .await;
        let last = rx.borrow().clone();
        assert_eq!(last.outcome, RunOutcome::Succeeded);
        assert_eq!(last.iteration_count, result.iteration_count());
    }
}
