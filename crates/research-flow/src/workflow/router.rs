//! Dynamic routing for the research workflow
//!
//! The router decides which step(s) run next from the current work item and
//! the step that just finished. It never executes steps. Its only side
//! effect is on the bookkeeping of the item it returns: iteration count,
//! visited steps, loop counts and quality history. Loop counts budget the
//! router's own loop-backs and are kept apart from the orchestrator's
//! transport retry counts.

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::OrchestratorError;
use crate::research::quality::{assess, QualityAssessment};
use crate::research::state::{Intent, WorkItem};

use super::config::{RouterConfig, MAX_RETRIES};
use super::node::{
    CITATION_FETCH, CITATION_FETCH_RELATED, END, QUERY_ANALYSIS, REASONING_EXECUTION,
    REASONING_SELECTION, START,
};

/// Why the router ended a run early
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The iteration cap was reached
    IterationBudgetExhausted,
    /// Reasoning selection produced no method
    NoReasoningMethod,
    /// Reasoning execution produced no answer and recovery is spent
    NoFinalResponse,
    /// The finished step is not part of the workflow
    UnknownStep(String),
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::IterationBudgetExhausted => write!(f, "iteration budget exhausted"),
            HaltReason::NoReasoningMethod => write!(f, "no reasoning method selected"),
            HaltReason::NoFinalResponse => write!(f, "no final response produced"),
            HaltReason::UnknownStep(step) => write!(f, "unknown step: {}", step),
        }
    }
}

/// Outcome of one routing decision
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// Work item with updated bookkeeping
    pub state: WorkItem,
    /// Steps to run next; several means run them concurrently
    pub next: Vec<String>,
    pub halt: Option<HaltReason>,
}

impl RoutingDecision {
    fn to(state: WorkItem, next: &[&str]) -> Self {
        Self {
            state,
            next: next.iter().map(|s| s.to_string()).collect(),
            halt: None,
        }
    }

    fn halt(state: WorkItem, reason: HaltReason) -> Self {
        Self {
            state,
            next: vec![END.to_string()],
            halt: Some(reason),
        }
    }

    /// True when the run should stop
    pub fn is_end(&self) -> bool {
        self.next.is_empty() || self.next.iter().all(|s| s == END)
    }
}

/// Decision engine driving the adaptive workflow
#[derive(Debug, Clone)]
pub struct Router {
    config: RouterConfig,
    complexity_keywords: Option<Regex>,
}

impl Router {
    /// Create a router, validating the configuration
    pub fn new(config: RouterConfig) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let complexity_keywords = if config.complexity_keywords.is_empty() {
            None
        } else {
            let alternatives = config
                .complexity_keywords
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?i)\b(?:{})", alternatives);
            let re = Regex::new(&pattern).map_err(|e| {
                OrchestratorError::config_error(format!("invalid complexity keywords: {}", e))
            })?;
            Some(re)
        };
        Ok(Self {
            config,
            complexity_keywords,
        })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Decide the next step(s) after `current` finished.
    ///
    /// `None` means the run is starting: bookkeeping is reset and the run
    /// begins with query analysis.
    pub fn next(&self, state: &WorkItem, current: Option<&str>) -> RoutingDecision {
        let mut state = state.clone();

        let Some(current) = current else {
            let bookkeeping = state.bookkeeping_mut();
            bookkeeping.iteration_count = 0;
            bookkeeping.visited_steps.clear();
            bookkeeping.current_step = Some(START.to_string());
            debug!(session_id = %state.session_id, "Routing start -> {}", QUERY_ANALYSIS);
            return RoutingDecision::to(state, &[QUERY_ANALYSIS]);
        };

        let iteration = {
            let bookkeeping = state.bookkeeping_mut();
            bookkeeping.iteration_count += 1;
            bookkeeping.iteration_count
        };
        if iteration >= self.config.max_total_iterations {
            warn!(
                session_id = %state.session_id,
                iteration,
                step = %current,
                "Iteration budget exhausted, ending run"
            );
            state.bookkeeping_mut().iteration_budget_exhausted = true;
            return RoutingDecision::halt(state, HaltReason::IterationBudgetExhausted);
        }

        let quality = assess(&state.citations, current);
        {
            let bookkeeping = state.bookkeeping_mut();
            bookkeeping.visited_steps.insert(current.to_string());
            bookkeeping.current_step = Some(current.to_string());
            bookkeeping
                .quality_history
                .insert(current.to_string(), quality.clone());
        }

        let decision = match current {
            START => RoutingDecision::to(state, &[QUERY_ANALYSIS]),
            QUERY_ANALYSIS => self.after_query_analysis(state),
            CITATION_FETCH | CITATION_FETCH_RELATED => self.after_citation_fetch(state, &quality),
            REASONING_SELECTION => self.after_reasoning_selection(state, &quality),
            REASONING_EXECUTION => self.after_reasoning_execution(state, &quality),
            END => RoutingDecision::to(state, &[]),
            unknown => {
                warn!(session_id = %state.session_id, step = %unknown, "Unknown step");
                RoutingDecision::halt(state, HaltReason::UnknownStep(unknown.to_string()))
            }
        };

        debug!(
            session_id = %decision.state.session_id,
            iteration,
            from = %current,
            next = ?decision.next,
            overall_quality = quality.overall,
            "Routing decision"
        );
        decision
    }

    fn after_query_analysis(&self, state: WorkItem) -> RoutingDecision {
        if let (Some(rule), Some(analysis)) = (&self.config.fan_out, &state.query_analysis) {
            if analysis.requires_citations && analysis.complexity_score >= rule.min_complexity {
                let targets: Vec<&str> = rule.targets.iter().map(String::as_str).collect();
                info!(session_id = %state.session_id, targets = ?targets, "Fanning out citation fetch");
                return RoutingDecision::to(state, &targets);
            }
        }
        RoutingDecision::to(state, &[CITATION_FETCH])
    }

    fn after_citation_fetch(&self, state: WorkItem, quality: &QualityAssessment) -> RoutingDecision {
        if self.citations_wanted(&state) {
            let count = state.citations.len();
            let rounds = state.loop_count(CITATION_FETCH);

            let complex_needs_more = self.is_complex_query(&state)
                && (count < self.config.min_citations_complex
                    || quality.avg_relevance < self.config.relevance_threshold)
                && rounds < self.config.complex_citation_retries;
            let too_few = count < self.config.min_citations && rounds < self.config.min_citation_retries;

            if complex_needs_more || too_few {
                return self.loop_to_citations(state, "evidence below target");
            }
        }
        RoutingDecision::to(state, &[REASONING_SELECTION])
    }

    fn after_reasoning_selection(
        &self,
        mut state: WorkItem,
        quality: &QualityAssessment,
    ) -> RoutingDecision {
        if state.selected_reasoning_method.is_none() {
            return RoutingDecision::halt(state, HaltReason::NoReasoningMethod);
        }

        if self.citations_wanted(&state) {
            let count = state.citations.len();
            let rounds = state.loop_count(CITATION_FETCH);
            let is_research = state
                .query_analysis
                .as_ref()
                .map(|a| a.intent == Intent::Research)
                .unwrap_or(false);

            let insufficient = (self.is_complex_query(&state)
                && quality.overall < self.config.reasoning_quality_threshold
                && rounds < self.config.complex_citation_retries)
                || (is_research
                    && count < self.config.min_citations_complex
                    && rounds < self.config.research_citation_retries);

            if insufficient {
                state.bookkeeping_mut().citation_improvement_round += 1;
                return self.loop_to_citations(state, "insufficient information for reasoning");
            }
        }
        RoutingDecision::to(state, &[REASONING_EXECUTION])
    }

    /// End, or improve the answer once.
    ///
    /// A low-quality answer gets one more pass. A complex answer resting on
    /// too few citations is improved only while the source can still supply
    /// new ones; after exhaustion the answer stands.
    fn after_reasoning_execution(
        &self,
        mut state: WorkItem,
        quality: &QualityAssessment,
    ) -> RoutingDecision {
        if state.final_response.is_none() {
            if state.loop_count(REASONING_EXECUTION) < MAX_RETRIES {
                increment_loop_count(&mut state, REASONING_EXECUTION);
                debug!(session_id = %state.session_id, "No response yet, reselecting reasoning");
                return RoutingDecision::to(state, &[REASONING_SELECTION]);
            }
            return RoutingDecision::halt(state, HaltReason::NoFinalResponse);
        }

        if !state.requires_citations() {
            return RoutingDecision::to(state, &[END]);
        }

        let count = state.citations.len();
        let rounds = state.loop_count(CITATION_FETCH);
        let low_quality = quality.overall < self.config.response_quality_threshold
            && !state.bookkeeping().response_improvement_done;
        let thin_complex = self.is_complex_query(&state)
            && count < self.config.response_min_citations
            && !state.signals.sources_exhausted
            && rounds < self.config.response_citation_retries;

        if !(low_quality || thin_complex) {
            return RoutingDecision::to(state, &[END]);
        }

        state.bookkeeping_mut().response_improvement_done = true;
        let evidence_bottleneck = count < self.config.response_min_citations
            || quality.relevance_is_bottleneck(self.config.relevance_threshold);

        if evidence_bottleneck
            && !state.signals.sources_exhausted
            && rounds < self.config.response_citation_retries
        {
            return self.loop_to_citations(state, "improving answer evidence");
        }
        RoutingDecision::to(state, &[REASONING_SELECTION])
    }

    fn loop_to_citations(&self, mut state: WorkItem, reason: &str) -> RoutingDecision {
        let round = increment_loop_count(&mut state, CITATION_FETCH);
        debug!(
            session_id = %state.session_id,
            round,
            reason,
            "Looping back to citation fetch"
        );
        RoutingDecision::to(state, &[CITATION_FETCH])
    }

    /// Citations are wanted when the analysis asks for them (or is absent)
    /// and the source has not reported exhaustion
    fn citations_wanted(&self, state: &WorkItem) -> bool {
        state.requires_citations() && !state.signals.sources_exhausted
    }

    /// High complexity score, long query, or an analytical keyword
    pub fn is_complex_query(&self, state: &WorkItem) -> bool {
        let high_score = state
            .query_analysis
            .as_ref()
            .map(|a| a.complexity_score >= self.config.complexity_threshold)
            .unwrap_or(false);
        let long_query = state.query.chars().count() > self.config.long_query_chars;
        let keyword = self
            .complexity_keywords
            .as_ref()
            .map(|re| re.is_match(&state.query))
            .unwrap_or(false);
        high_score || long_query || keyword
    }
}

/// Count a router loop back to `step`, never beyond [`MAX_RETRIES`].
///
/// Returns the new count. Transport retries are counted separately by the
/// orchestrator and never consume this budget.
pub fn increment_loop_count(state: &mut WorkItem, step: &str) -> usize {
    if state.loop_count(step) >= MAX_RETRIES {
        return MAX_RETRIES;
    }
    state.increment_loop_count(step)
}

/// Router loop-backs recorded for `step`
pub fn loop_count(state: &WorkItem, step: &str) -> usize {
    state.loop_count(step)
}

/// Count a transport retry of `step`, never beyond [`MAX_RETRIES`].
///
/// Returns the new count.
pub fn increment_retry_count(state: &mut WorkItem, step: &str) -> usize {
    if state.retry_count(step) >= MAX_RETRIES {
        return MAX_RETRIES;
    }
    state.increment_retry_count(step)
}

/// Transport retries recorded for `step`
pub fn retry_count(state: &WorkItem, step: &str) -> usize {
    state.retry_count(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::MAX_TOTAL_ITERATIONS;
    use crate::research::state::{Citation, FinalResponse, QueryAnalysis, ReasoningMethod, RoutingSignals};

    fn router() -> Router {
        Router::new(RouterConfig::default()).unwrap()
    }

    fn analyzed(query: &str, intent: Intent, complexity: f32, requires: bool) -> WorkItem {
        WorkItem::for_query("s", query).with_query_analysis(QueryAnalysis::new(intent, complexity, requires))
    }

    fn citations(n: usize, relevance: f32) -> Vec<Citation> {
        (0..n)
            .map(|i| {
                Citation::new(format!("c{}", i), format!("https://site{}.com/page", i), relevance)
                    .with_content("x".repeat(3_000))
            })
            .collect()
    }

    #[test]
    fn test_start_resets_bookkeeping() {
        let mut state = WorkItem::for_query("s", "q");
        state.bookkeeping_mut().iteration_count = 7;
        state.bookkeeping_mut().visited_steps.insert("x".into());

        let decision = router().next(&state, None);
        assert_eq!(decision.next, vec![QUERY_ANALYSIS]);
        assert_eq!(decision.state.iteration_count(), 0);
        assert!(decision.state.bookkeeping().visited_steps.is_empty());
        // Input untouched
        assert_eq!(state.iteration_count(), 7);
    }

    #[test]
    fn test_query_analysis_routes_to_citation_fetch() {
        let state = analyzed("what is rust", Intent::Factual, 2.0, true);
        let decision = router().next(&state, Some(QUERY_ANALYSIS));
        assert_eq!(decision.next, vec![CITATION_FETCH]);
        assert_eq!(decision.state.iteration_count(), 1);
        assert!(decision.state.has_visited(QUERY_ANALYSIS));
        assert!(decision.state.quality_for(QUERY_ANALYSIS).is_some());
    }

    #[test]
    fn test_fan_out_for_complex_queries() {
        let config = RouterConfig::default()
            .with_fan_out([CITATION_FETCH, CITATION_FETCH_RELATED], 6.0);
        let router = Router::new(config).unwrap();

        let complex = analyzed("q", Intent::Research, 8.0, true);
        let decision = router.next(&complex, Some(QUERY_ANALYSIS));
        assert_eq!(decision.next, vec![CITATION_FETCH, CITATION_FETCH_RELATED]);

        let simple = analyzed("q", Intent::Research, 3.0, true);
        let decision = router.next(&simple, Some(QUERY_ANALYSIS));
        assert_eq!(decision.next, vec![CITATION_FETCH]);
    }

    #[test]
    fn test_citation_fetch_skips_when_not_required() {
        let state = analyzed("hello there", Intent::Conversational, 1.0, false);
        let decision = router().next(&state, Some(CITATION_FETCH));
        assert_eq!(decision.next, vec![REASONING_SELECTION]);
        assert_eq!(decision.state.loop_count(CITATION_FETCH), 0);
    }

    #[test]
    fn test_complex_query_loops_for_more_citations() {
        let state = analyzed("q", Intent::Research, 8.0, true).with_citations(citations(1, 0.9));
        let decision = router().next(&state, Some(CITATION_FETCH));
        assert_eq!(decision.next, vec![CITATION_FETCH]);
        assert_eq!(decision.state.loop_count(CITATION_FETCH), 1);
    }

    #[test]
    fn test_complex_loop_stops_at_budget() {
        let mut state = analyzed("q", Intent::Research, 8.0, true).with_citations(citations(1, 0.9));
        for _ in 0..3 {
            increment_loop_count(&mut state, CITATION_FETCH);
        }
        let decision = router().next(&state, Some(CITATION_FETCH));
        assert_eq!(decision.next, vec![REASONING_SELECTION]);
        assert_eq!(decision.state.loop_count(CITATION_FETCH), 3);
    }

    #[test]
    fn test_exhausted_source_stops_loop() {
        let state = analyzed("q", Intent::Research, 8.0, true)
            .with_citations(citations(1, 0.9))
            .with_signals(RoutingSignals {
                sources_exhausted: true,
                refined_query: None,
            });
        let decision = router().next(&state, Some(CITATION_FETCH));
        assert_eq!(decision.next, vec![REASONING_SELECTION]);
    }

    #[test]
    fn test_transport_retries_do_not_spend_loop_budget() {
        let mut state = analyzed("q", Intent::Research, 8.0, true).with_citations(citations(1, 0.9));
        for _ in 0..MAX_RETRIES {
            state.increment_retry_count(CITATION_FETCH);
        }
        let decision = router().next(&state, Some(CITATION_FETCH));
        assert_eq!(decision.next, vec![CITATION_FETCH]);
        assert_eq!(decision.state.loop_count(CITATION_FETCH), 1);
        assert_eq!(decision.state.retry_count(CITATION_FETCH), MAX_RETRIES);
    }

    #[test]
    fn test_simple_query_with_few_citations_loops_twice_at_most() {
        let mut state = analyzed("q", Intent::Factual, 2.0, true);
        let router = router();
        let decision = router.next(&state, Some(CITATION_FETCH));
        assert_eq!(decision.next, vec![CITATION_FETCH]);

        for _ in 0..2 {
            increment_loop_count(&mut state, CITATION_FETCH);
        }
        let decision = router.next(&state, Some(CITATION_FETCH));
        assert_eq!(decision.next, vec![REASONING_SELECTION]);
    }

    #[test]
    fn test_reasoning_selection_without_method_halts() {
        let state = analyzed("q", Intent::Factual, 2.0, false);
        let decision = router().next(&state, Some(REASONING_SELECTION));
        assert_eq!(decision.next, vec![END]);
        assert_eq!(decision.halt, Some(HaltReason::NoReasoningMethod));
    }

    #[test]
    fn test_reasoning_selection_requests_more_evidence() {
        let state = analyzed("q", Intent::Research, 8.0, true)
            .with_citations(citations(1, 0.2))
            .with_reasoning(ReasoningMethod::Analytical);
        let decision = router().next(&state, Some(REASONING_SELECTION));
        assert_eq!(decision.next, vec![CITATION_FETCH]);
        assert_eq!(decision.state.bookkeeping().citation_improvement_round, 1);
        assert_eq!(decision.state.loop_count(CITATION_FETCH), 1);
    }

    #[test]
    fn test_reasoning_selection_proceeds_with_good_evidence() {
        let state = analyzed("q", Intent::Factual, 2.0, true)
            .with_citations(citations(4, 0.9))
            .with_reasoning(ReasoningMethod::Direct);
        let decision = router().next(&state, Some(REASONING_SELECTION));
        assert_eq!(decision.next, vec![REASONING_EXECUTION]);
    }

    #[test]
    fn test_reasoning_execution_ends_with_good_answer() {
        let state = analyzed("q", Intent::Factual, 2.0, true)
            .with_citations(citations(4, 0.9))
            .with_reasoning(ReasoningMethod::Direct)
            .with_response(FinalResponse::new("answer"));
        let decision = router().next(&state, Some(REASONING_EXECUTION));
        assert_eq!(decision.next, vec![END]);
        assert!(decision.halt.is_none());
    }

    #[test]
    fn test_reasoning_execution_improves_thin_answer_once() {
        let state = analyzed("q", Intent::Factual, 2.0, true)
            .with_citations(citations(1, 0.3))
            .with_reasoning(ReasoningMethod::Direct)
            .with_response(FinalResponse::new("answer"));
        let router = router();

        let decision = router.next(&state, Some(REASONING_EXECUTION));
        assert_eq!(decision.next, vec![CITATION_FETCH]);
        assert!(decision.state.bookkeeping().response_improvement_done);

        // Not again once the improvement loop has run
        let decision = router.next(&decision.state, Some(REASONING_EXECUTION));
        assert_eq!(decision.next, vec![END]);
    }

    #[test]
    fn test_thin_complex_answer_ends_when_sources_exhausted() {
        let state = analyzed("q", Intent::Research, 8.0, true)
            .with_citations(citations(2, 0.9))
            .with_signals(RoutingSignals {
                sources_exhausted: true,
                refined_query: None,
            })
            .with_reasoning(ReasoningMethod::Analytical)
            .with_response(FinalResponse::new("answer"));

        let decision = router().next(&state, Some(REASONING_EXECUTION));
        assert_eq!(decision.next, vec![END]);
        assert!(decision.halt.is_none());
        assert!(!decision.state.bookkeeping().response_improvement_done);
    }

    #[test]
    fn test_missing_response_recovers_then_halts() {
        let mut state = analyzed("q", Intent::Factual, 2.0, true).with_reasoning(ReasoningMethod::Direct);
        let router = router();

        let decision = router.next(&state, Some(REASONING_EXECUTION));
        assert_eq!(decision.next, vec![REASONING_SELECTION]);
        assert_eq!(decision.state.loop_count(REASONING_EXECUTION), 1);

        for _ in 0..MAX_RETRIES {
            increment_loop_count(&mut state, REASONING_EXECUTION);
        }
        let decision = router.next(&state, Some(REASONING_EXECUTION));
        assert_eq!(decision.halt, Some(HaltReason::NoFinalResponse));
    }

    #[test]
    fn test_unknown_step_halts() {
        let state = WorkItem::for_query("s", "q");
        let decision = router().next(&state, Some("mystery"));
        assert_eq!(decision.next, vec![END]);
        assert_eq!(decision.halt, Some(HaltReason::UnknownStep("mystery".into())));
    }

    #[test]
    fn test_end_returns_nothing() {
        let state = WorkItem::for_query("s", "q");
        let decision = router().next(&state, Some(END));
        assert!(decision.next.is_empty());
        assert!(decision.is_end());
    }

    #[test]
    fn test_iteration_cap_forces_end() {
        let router = router();
        let mut state = router.next(&WorkItem::for_query("s", "q"), None).state;

        let mut last = None;
        for _ in 0..50 {
            let decision = router.next(&state, Some(START));
            state = decision.state.clone();
            if decision.is_end() {
                last = Some(decision);
                break;
            }
        }

        let last = last.unwrap();
        assert_eq!(last.halt, Some(HaltReason::IterationBudgetExhausted));
        assert_eq!(last.state.iteration_count(), 15);
        assert!(last.state.bookkeeping().iteration_budget_exhausted);
    }

    #[test]
    fn test_quality_loops_end_at_iteration_cap() {
        let router = router();
        let mut state = analyzed("q", Intent::Research, 8.0, true).with_citations(citations(1, 0.2));

        let mut loops = 0;
        let mut last = None;
        for _ in 0..20 {
            // Keep the loop budget fresh so quality alone drives the loop
            state.bookkeeping_mut().loop_counts.clear();
            let decision = router.next(&state, Some(CITATION_FETCH));
            state = decision.state.clone();
            if decision.is_end() {
                last = Some(decision);
                break;
            }
            assert_eq!(decision.next, vec![CITATION_FETCH]);
            loops += 1;
        }

        let last = last.unwrap();
        assert_eq!(loops, MAX_TOTAL_ITERATIONS - 1);
        assert_eq!(last.halt, Some(HaltReason::IterationBudgetExhausted));
        assert_eq!(last.state.iteration_count(), MAX_TOTAL_ITERATIONS);
    }

    #[test]
    fn test_iteration_count_monotonic() {
        let router = router();
        let mut state = WorkItem::for_query("s", "q");
        let mut previous = 0;
        for step in [QUERY_ANALYSIS, CITATION_FETCH, REASONING_SELECTION, REASONING_EXECUTION] {
            state = router.next(&state, Some(step)).state;
            assert!(state.iteration_count() > previous);
            previous = state.iteration_count();
        }
    }

    #[test]
    fn test_loop_count_never_exceeds_max() {
        let mut state = WorkItem::for_query("s", "q");
        for _ in 0..10 {
            increment_loop_count(&mut state, CITATION_FETCH);
        }
        assert_eq!(loop_count(&state, CITATION_FETCH), MAX_RETRIES);
        assert_eq!(retry_count(&state, CITATION_FETCH), 0);
    }

    #[test]
    fn test_retry_count_never_exceeds_max() {
        let mut state = WorkItem::for_query("s", "q");
        for _ in 0..10 {
            increment_retry_count(&mut state, QUERY_ANALYSIS);
        }
        assert_eq!(retry_count(&state, QUERY_ANALYSIS), MAX_RETRIES);
        assert_eq!(loop_count(&state, QUERY_ANALYSIS), 0);
    }

    #[test]
    fn test_is_complex_query() {
        let router = router();
        assert!(router.is_complex_query(&analyzed("q", Intent::Research, 6.0, true)));
        assert!(router.is_complex_query(&WorkItem::for_query("s", "Compare tokio and async-std")));
        assert!(router.is_complex_query(&WorkItem::for_query("s", "please ANALYZE this")));
        assert!(router.is_complex_query(&WorkItem::for_query("s", "a".repeat(101))));
        assert!(!router.is_complex_query(&WorkItem::for_query("s", "what is rust")));
    }
}
