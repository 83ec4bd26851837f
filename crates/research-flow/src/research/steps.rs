//! Concrete research steps
//!
//! Thin adapters from the collaborator traits in [`crate::providers`] to the
//! [`Step`] contract. Each step changes only the part of the work item it is
//! responsible for.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::StepError;
use crate::providers::{CitationSource, PromptContext, QueryAnalyzer, ReasoningProvider};
use crate::research::state::{FinalResponse, Intent, ReasoningMethod, RoutingSignals, WorkItem};
use crate::workflow::node::{
    Step, CITATION_FETCH, CITATION_FETCH_RELATED, QUERY_ANALYSIS, REASONING_EXECUTION,
    REASONING_SELECTION,
};

/// Default number of results requested per citation round
pub const DEFAULT_CITATION_LIMIT: usize = 5;

/// Suffixes appended to the query on successive citation rounds
const REFINEMENTS: &[&str] = &["overview", "in-depth analysis", "expert sources"];

// =============================================================================
// Query analysis
// =============================================================================

/// Classifies the query through a [`QueryAnalyzer`]
pub struct QueryAnalysisStep {
    analyzer: Arc<dyn QueryAnalyzer>,
}

impl QueryAnalysisStep {
    pub fn new(analyzer: Arc<dyn QueryAnalyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl Step for QueryAnalysisStep {
    fn name(&self) -> &str {
        QUERY_ANALYSIS
    }

    fn should_run(&self, state: &WorkItem) -> bool {
        state.query_analysis.is_none()
    }

    async fn run(&self, state: &WorkItem) -> Result<WorkItem, StepError> {
        if state.query.trim().is_empty() {
            return Err(StepError::InvalidInput("query is empty".to_string()));
        }
        let analysis = self.analyzer.analyze(&state.query).await?;
        info!(
            session_id = %state.session_id,
            intent = ?analysis.intent,
            complexity = analysis.complexity_score,
            requires_citations = analysis.requires_citations,
            "Query analyzed"
        );
        Ok(state.with_query_analysis(analysis))
    }
}

// =============================================================================
// Citation fetch
// =============================================================================

/// How a citation step builds its search query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationStrategy {
    /// The user query, refined on each retry round
    Primary,
    /// Background material around the query
    Related,
}

/// Gathers citations from a [`CitationSource`]
///
/// New results are appended after the existing citations; results whose
/// URL is already present are dropped. The primary strategy flags the
/// source as exhausted when a round yields nothing new.
pub struct CitationFetchStep {
    source: Arc<dyn CitationSource>,
    strategy: CitationStrategy,
    limit: usize,
}

impl CitationFetchStep {
    /// Primary citation step, registered as `citation_fetch`
    pub fn primary(source: Arc<dyn CitationSource>) -> Self {
        Self {
            source,
            strategy: CitationStrategy::Primary,
            limit: DEFAULT_CITATION_LIMIT,
        }
    }

    /// Related-topics citation step, registered as `citation_fetch_related`
    pub fn related(source: Arc<dyn CitationSource>) -> Self {
        Self {
            source,
            strategy: CitationStrategy::Related,
            limit: DEFAULT_CITATION_LIMIT,
        }
    }

    /// Set the number of results requested per round
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Search query for the current round
    pub fn search_query(&self, state: &WorkItem) -> String {
        match self.strategy {
            CitationStrategy::Primary => {
                if let Some(refined) = &state.signals.refined_query {
                    return refined.clone();
                }
                match state.loop_count(CITATION_FETCH) {
                    0 => state.query.clone(),
                    round => format!(
                        "{} {}",
                        state.query,
                        REFINEMENTS[(round - 1) % REFINEMENTS.len()]
                    ),
                }
            }
            CitationStrategy::Related => format!("{} background context", state.query),
        }
    }
}

#[async_trait]
impl Step for CitationFetchStep {
    fn name(&self) -> &str {
        match self.strategy {
            CitationStrategy::Primary => CITATION_FETCH,
            CitationStrategy::Related => CITATION_FETCH_RELATED,
        }
    }

    fn should_run(&self, state: &WorkItem) -> bool {
        state.requires_citations()
    }

    async fn run(&self, state: &WorkItem) -> Result<WorkItem, StepError> {
        let query = self.search_query(state);
        debug!(session_id = %state.session_id, step = self.name(), query = %query, "Searching");

        let results = self.source.search(&query, self.limit).await?;

        let mut seen: HashSet<String> = state.citations.iter().map(|c| c.url.clone()).collect();
        let fresh: Vec<_> = results
            .into_iter()
            .filter(|c| seen.insert(c.url.clone()))
            .collect();

        info!(
            session_id = %state.session_id,
            step = self.name(),
            new_citations = fresh.len(),
            "Citation round finished"
        );

        let mut next = state.with_metadata(format!("{}_query", self.name()), json!(query));

        if self.strategy == CitationStrategy::Primary {
            let signals = RoutingSignals {
                sources_exhausted: fresh.is_empty(),
                refined_query: None,
            };
            if signals != next.signals {
                next = next.with_signals(signals);
            }
        }

        if !fresh.is_empty() {
            let mut citations = next.citations.clone();
            citations.extend(fresh);
            next = next.with_citations(citations);
        }
        Ok(next)
    }
}

// =============================================================================
// Reasoning
// =============================================================================

/// Picks a reasoning method from the query analysis
#[derive(Debug, Clone)]
pub struct ReasoningSelectionStep {
    complexity_threshold: f32,
}

impl Default for ReasoningSelectionStep {
    fn default() -> Self {
        Self {
            complexity_threshold: 6.0,
        }
    }
}

impl ReasoningSelectionStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complexity score at which analytical reasoning is chosen
    pub fn with_complexity_threshold(mut self, threshold: f32) -> Self {
        self.complexity_threshold = threshold;
        self
    }

    pub fn select(&self, state: &WorkItem) -> ReasoningMethod {
        let Some(analysis) = &state.query_analysis else {
            return ReasoningMethod::Direct;
        };
        match analysis.intent {
            Intent::Comparison => ReasoningMethod::Comparative,
            _ if analysis.complexity_score >= self.complexity_threshold => {
                ReasoningMethod::Analytical
            }
            Intent::Research => ReasoningMethod::Analytical,
            Intent::Explanation => ReasoningMethod::ChainOfThought,
            Intent::Factual | Intent::Conversational | Intent::Unknown => ReasoningMethod::Direct,
        }
    }
}

#[async_trait]
impl Step for ReasoningSelectionStep {
    fn name(&self) -> &str {
        REASONING_SELECTION
    }

    async fn run(&self, state: &WorkItem) -> Result<WorkItem, StepError> {
        let method = self.select(state);
        debug!(session_id = %state.session_id, method = method.as_str(), "Reasoning method selected");
        Ok(state.with_reasoning(method))
    }
}

/// Produces the answer through a [`ReasoningProvider`]
pub struct ReasoningExecutionStep {
    provider: Arc<dyn ReasoningProvider>,
}

impl ReasoningExecutionStep {
    pub fn new(provider: Arc<dyn ReasoningProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Step for ReasoningExecutionStep {
    fn name(&self) -> &str {
        REASONING_EXECUTION
    }

    fn should_run(&self, state: &WorkItem) -> bool {
        state.selected_reasoning_method.is_some()
    }

    async fn run(&self, state: &WorkItem) -> Result<WorkItem, StepError> {
        let method = state
            .selected_reasoning_method
            .ok_or_else(|| StepError::InvalidInput("no reasoning method selected".to_string()))?;

        let context = PromptContext {
            query: state.query.clone(),
            method,
            citations: state.citations.clone(),
            prompt_config: state.prompt_config.clone(),
            user_profile: state.user_profile.clone(),
        };
        let completion = self.provider.complete(&context).await?;

        if completion.raw_text.trim().is_empty() {
            warn!(session_id = %state.session_id, "Reasoning provider returned an empty answer");
            return Ok(state.clone());
        }

        let mut response = FinalResponse::new(completion.raw_text).with_method(method);
        if let Some(structured) = completion.structured_output {
            response = response.with_structured_output(structured);
        }
        info!(
            session_id = %state.session_id,
            method = method.as_str(),
            citations = state.citations.len(),
            "Answer produced"
        );
        Ok(state.with_response(response))
    }
}
