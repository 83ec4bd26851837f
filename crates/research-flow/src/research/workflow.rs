//! Pre-built research workflow
//!
//! Wires the collaborators into the four research steps and builds an
//! [`Orchestrator`] (or a [`ResearchService`] around one).
//!
//! ```text
//!  start ─▶ query_analysis ─▶ citation_fetch ─▶ reasoning_selection ─▶ reasoning_execution ─▶ end
//!                               ▲      │  ▲               │                    │
//!                               └──────┘  └───────────────┴────────────────────┘
//!                            (more evidence)        (improvement loops)
//! ```
//!
//! With parallel citation sources enabled, complex queries fan out to
//! `citation_fetch` and `citation_fetch_related` after analysis; the branches
//! are merged and the run continues at `reasoning_selection`.
//!
//! # Usage
//!
//! ```ignore
//! use research_flow::research::ResearchWorkflowBuilder;
//!
//! let service = ResearchWorkflowBuilder::new()
//!     .citation_source(Arc::new(my_search))
//!     .reasoning_provider(Arc::new(my_llm))
//!     .parallel_citation_sources(true)
//!     .build_service()?;
//!
//! let result = service.run("session-1", "Compare tokio and async-std", json!({}), json!({})).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::error::OrchestratorError;
use crate::providers::{CitationSource, HeuristicQueryAnalyzer, QueryAnalyzer, ReasoningProvider};
use crate::workflow::config::{OrchestratorConfig, RetryPolicy, RouterConfig};
use crate::workflow::executor::Orchestrator;
use crate::workflow::node::{StepRegistry, CITATION_FETCH, CITATION_FETCH_RELATED, REQUIRED_STEPS};
use crate::workflow::session::ResearchService;

use super::steps::{
    CitationFetchStep, QueryAnalysisStep, ReasoningExecutionStep, ReasoningSelectionStep,
    DEFAULT_CITATION_LIMIT,
};

/// Builder for the research orchestrator
#[derive(Clone)]
pub struct ResearchWorkflowBuilder {
    analyzer: Option<Arc<dyn QueryAnalyzer>>,
    citation_source: Option<Arc<dyn CitationSource>>,

    /// Source for the related-topics branch (defaults to the citation source)
    related_source: Option<Arc<dyn CitationSource>>,

    reasoning: Option<Arc<dyn ReasoningProvider>>,

    /// Results requested per citation round
    citation_limit: usize,

    /// Fan out to two citation strategies for complex queries
    parallel_citation_sources: bool,

    orchestrator_config: OrchestratorConfig,
    router_config: RouterConfig,
}

impl Default for ResearchWorkflowBuilder {
    fn default() -> Self {
        Self {
            analyzer: None,
            citation_source: None,
            related_source: None,
            reasoning: None,
            citation_limit: DEFAULT_CITATION_LIMIT,
            parallel_citation_sources: false,
            orchestrator_config: OrchestratorConfig::default(),
            router_config: RouterConfig::default(),
        }
    }
}

impl ResearchWorkflowBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query analyzer.
    ///
    /// Default: [`HeuristicQueryAnalyzer`]
    pub fn analyzer(mut self, analyzer: Arc<dyn QueryAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Set the citation source (required).
    pub fn citation_source(mut self, source: Arc<dyn CitationSource>) -> Self {
        self.citation_source = Some(source);
        self
    }

    /// Set a distinct source for the related-topics branch.
    pub fn related_source(mut self, source: Arc<dyn CitationSource>) -> Self {
        self.related_source = Some(source);
        self
    }

    /// Set the reasoning provider (required).
    pub fn reasoning_provider(mut self, provider: Arc<dyn ReasoningProvider>) -> Self {
        self.reasoning = Some(provider);
        self
    }

    /// Set the number of results requested per citation round.
    ///
    /// Default: 5
    pub fn citation_limit(mut self, limit: usize) -> Self {
        self.citation_limit = limit;
        self
    }

    /// Run two citation strategies concurrently for complex queries.
    ///
    /// Default: false
    pub fn parallel_citation_sources(mut self, enabled: bool) -> Self {
        self.parallel_citation_sources = enabled;
        self
    }

    /// Set the routing-decision budget.
    ///
    /// Default: 15
    pub fn max_total_iterations(mut self, max: usize) -> Self {
        self.orchestrator_config = self.orchestrator_config.with_max_total_iterations(max);
        self
    }

    /// Set the per-step timeout.
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.orchestrator_config = self.orchestrator_config.with_step_timeout(timeout);
        self
    }

    /// Set the whole-run timeout.
    pub fn workflow_timeout(mut self, timeout: Duration) -> Self {
        self.orchestrator_config = self.orchestrator_config.with_workflow_timeout(timeout);
        self
    }

    /// Set the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.orchestrator_config = self.orchestrator_config.with_retry_policy(policy);
        self
    }

    /// Replace the orchestrator configuration wholesale.
    pub fn orchestrator_config(mut self, config: OrchestratorConfig) -> Self {
        self.orchestrator_config = config;
        self
    }

    /// Replace the routing thresholds.
    pub fn router_config(mut self, config: RouterConfig) -> Self {
        self.router_config = config;
        self
    }

    /// Build the step registry.
    pub fn build_registry(&self) -> Result<StepRegistry, OrchestratorError> {
        let source = self
            .citation_source
            .clone()
            .ok_or_else(|| OrchestratorError::config_error("a citation source is required"))?;
        let reasoning = self
            .reasoning
            .clone()
            .ok_or_else(|| OrchestratorError::config_error("a reasoning provider is required"))?;
        let analyzer = self
            .analyzer
            .clone()
            .unwrap_or_else(|| Arc::new(HeuristicQueryAnalyzer::new()) as Arc<dyn QueryAnalyzer>);

        let mut registry = StepRegistry::new();
        registry.register(Arc::new(QueryAnalysisStep::new(analyzer)))?;
        registry.register(Arc::new(
            CitationFetchStep::primary(source.clone()).with_limit(self.citation_limit),
        ))?;
        registry.register(Arc::new(
            ReasoningSelectionStep::new()
                .with_complexity_threshold(self.router_config.complexity_threshold),
        ))?;
        registry.register(Arc::new(ReasoningExecutionStep::new(reasoning)))?;

        if self.parallel_citation_sources {
            let related = self.related_source.clone().unwrap_or(source);
            registry.register(Arc::new(
                CitationFetchStep::related(related).with_limit(self.citation_limit),
            ))?;
        }

        registry.ensure_registered(&REQUIRED_STEPS)?;
        Ok(registry)
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        let registry = self.build_registry()?;
        let mut router_config = self.router_config;
        if self.parallel_citation_sources && router_config.fan_out.is_none() {
            let threshold = router_config.complexity_threshold;
            router_config =
                router_config.with_fan_out([CITATION_FETCH, CITATION_FETCH_RELATED], threshold);
        }
        if let Some(rule) = &router_config.fan_out {
            let targets: Vec<&str> = rule.targets.iter().map(String::as_str).collect();
            registry.ensure_registered(&targets)?;
        }
        Orchestrator::new(registry, self.orchestrator_config, router_config)
    }

    /// Build a session service around the orchestrator.
    pub fn build_service(self) -> Result<ResearchService, OrchestratorError> {
        Ok(ResearchService::new(self.build()?))
    }
}
