//! Orchestrator and router configuration
//!
//! Budgets, timeouts, retry policy and the routing thresholds used by the
//! [`Router`](super::router::Router).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{OrchestratorError, StepError};

/// Upper bound on transport retries per step invocation and on router loop-backs per step
pub const MAX_RETRIES: usize = 3;

/// Routing decisions after which the router forces the run to end
pub const MAX_TOTAL_ITERATIONS: usize = 15;

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Routing decisions before forced termination
    pub max_total_iterations: usize,

    /// Timeout for a single step execution
    #[serde(with = "humantime_serde")]
    pub step_timeout: Duration,

    /// Wall-clock budget for the entire run (None = unbounded)
    #[serde(default, with = "humantime_serde")]
    pub workflow_timeout: Option<Duration>,

    /// Enable per-step tracing
    pub tracing_enabled: bool,

    /// Retry policy for failed steps
    pub retry_policy: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_total_iterations: MAX_TOTAL_ITERATIONS,
            step_timeout: Duration::from_secs(120), // 2 min per step
            workflow_timeout: None,
            tracing_enabled: true,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration budget
    pub fn with_max_total_iterations(mut self, max: usize) -> Self {
        self.max_total_iterations = max;
        self
    }

    /// Set step timeout
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    /// Set workflow timeout
    pub fn with_workflow_timeout(mut self, timeout: Duration) -> Self {
        self.workflow_timeout = Some(timeout);
        self
    }

    /// Enable or disable tracing
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing_enabled = enabled;
        self
    }

    /// Set retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.max_total_iterations == 0 {
            return Err(OrchestratorError::config_error(
                "max_total_iterations must be at least 1",
            ));
        }
        if self.step_timeout.is_zero() {
            return Err(OrchestratorError::config_error("step_timeout must be non-zero"));
        }
        if self.retry_policy.max_retries > MAX_RETRIES {
            return Err(OrchestratorError::config_error(format!(
                "max_retries {} exceeds the limit of {}",
                self.retry_policy.max_retries, MAX_RETRIES
            )));
        }
        Ok(())
    }
}

/// Retry policy for failed step executions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retry attempts per step
    pub max_retries: usize,

    /// Base delay for exponential backoff
    #[serde(with = "humantime_serde")]
    pub backoff_base: Duration,

    /// Maximum delay between retries
    #[serde(with = "humantime_serde")]
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set backoff base duration
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set maximum backoff duration
    pub fn with_backoff_max(mut self, max: Duration) -> Self {
        self.backoff_max = max;
        self
    }

    /// Calculate delay for a given retry attempt (exponential backoff)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt as u32);
        let delay = self.backoff_base.saturating_mul(multiplier);
        delay.min(self.backoff_max)
    }

    /// Whether a step invocation that already retried `retries` times may
    /// run again after failing with `error`
    pub fn should_retry(&self, retries: usize, error: &StepError) -> bool {
        error.is_retryable() && retries < self.max_retries
    }

    /// Create a no-retry policy
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

/// Steps the router returns together after query analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanOutRule {
    /// Step names executed concurrently
    pub targets: Vec<String>,
    /// Only fan out when the query complexity reaches this score
    pub min_complexity: f32,
}

/// Thresholds driving the router's decisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    pub max_total_iterations: usize,

    /// Complexity score at or above which a query counts as complex
    pub complexity_threshold: f32,
    /// Query length (chars) above which a query counts as complex
    pub long_query_chars: usize,
    /// Words that mark a query as complex (case-insensitive, word prefix)
    pub complexity_keywords: Vec<String>,

    /// Citations wanted for a complex query
    pub min_citations_complex: usize,
    /// Citations wanted for any query that needs them
    pub min_citations: usize,
    pub relevance_threshold: f64,

    /// Overall quality needed before reasoning on a complex query
    pub reasoning_quality_threshold: f64,
    /// Overall quality below which an answer is worth improving
    pub response_quality_threshold: f64,

    /// Citation loop budget for complex queries
    pub complex_citation_retries: usize,
    /// Citation loop budget for thin evidence
    pub min_citation_retries: usize,
    /// Citation loop budget for research intents lacking sources
    pub research_citation_retries: usize,

    /// Citation count a complex answer should rest on
    pub response_min_citations: usize,
    /// Citation loop budget when improving an answer
    pub response_citation_retries: usize,

    #[serde(default)]
    pub fan_out: Option<FanOutRule>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_total_iterations: MAX_TOTAL_ITERATIONS,
            complexity_threshold: 6.0,
            long_query_chars: 100,
            complexity_keywords: vec!["compare".to_string(), "analyze".to_string()],
            min_citations_complex: 3,
            min_citations: 2,
            relevance_threshold: 0.6,
            reasoning_quality_threshold: 0.7,
            response_quality_threshold: 0.6,
            complex_citation_retries: 3,
            min_citation_retries: 2,
            research_citation_retries: 2,
            response_min_citations: 5,
            response_citation_retries: 2,
            fan_out: None,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration budget
    pub fn with_max_total_iterations(mut self, max: usize) -> Self {
        self.max_total_iterations = max;
        self
    }

    /// Set the complexity threshold
    pub fn with_complexity_threshold(mut self, threshold: f32) -> Self {
        self.complexity_threshold = threshold;
        self
    }

    /// Run `targets` concurrently after query analysis for complex queries
    pub fn with_fan_out<I, S>(mut self, targets: I, min_complexity: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fan_out = Some(FanOutRule {
            targets: targets.into_iter().map(Into::into).collect(),
            min_complexity,
        });
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.max_total_iterations == 0 {
            return Err(OrchestratorError::config_error(
                "max_total_iterations must be at least 1",
            ));
        }
        let budgets = [
            self.complex_citation_retries,
            self.min_citation_retries,
            self.research_citation_retries,
            self.response_citation_retries,
        ];
        if budgets.iter().any(|b| *b > MAX_RETRIES) {
            return Err(OrchestratorError::config_error(format!(
                "citation retry budgets may not exceed {}",
                MAX_RETRIES
            )));
        }
        if let Some(rule) = &self.fan_out {
            if rule.targets.len() < 2 {
                return Err(OrchestratorError::config_error(
                    "fan_out needs at least two targets",
                ));
            }
        }
        Ok(())
    }
}
