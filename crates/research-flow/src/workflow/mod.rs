//! Workflow engine
//!
//! - `node` - Step trait, step names and the step registry
//! - `config` - Orchestrator budgets, retry policy and routing thresholds
//! - `router` - Decides the next step(s) from the current work item
//! - `executor` - Drives the run: retries, timeouts, fan-out, cancellation
//! - `session` - Per-session run/cancel/progress surface

pub mod config;
pub mod executor;
pub mod node;
pub mod router;
pub mod session;

pub use config::{
    FanOutRule, OrchestratorConfig, RetryPolicy, RouterConfig, MAX_RETRIES, MAX_TOTAL_ITERATIONS,
};
pub use executor::Orchestrator;
pub use node::{Step, StepRegistry};
pub use router::{
    increment_loop_count, increment_retry_count, loop_count, retry_count, HaltReason, Router,
    RoutingDecision,
};
pub use session::ResearchService;
