//! Research work item definition
//!
//! A [`WorkItem`] is the state threaded through one workflow run. It is
//! immutable per step: every transition borrows the current item and returns
//! a new one carrying exactly one semantic change plus an audit record.
//!
//! Bookkeeping (iteration count, visited steps, retry counts, quality
//! history) is readable by anyone but only the router and the orchestrator
//! can change it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::error::WorkflowFailure;

use super::quality::QualityAssessment;

/// A supporting source gathered during research
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
    /// Extracted content/snippet
    pub content: String,
    /// Relevance score (0.0 to 1.0)
    pub relevance_score: f32,
    pub domain: String,
    pub retrieved_at: DateTime<Utc>,
}

impl Citation {
    /// Create a new citation; the domain is derived from the URL
    pub fn new(title: impl Into<String>, url: impl Into<String>, relevance: f32) -> Self {
        let url = url.into();
        Self {
            title: title.into(),
            domain: extract_domain(&url).unwrap_or_default(),
            url,
            content: String::new(),
            relevance_score: relevance.clamp(0.0, 1.0),
            retrieved_at: Utc::now(),
        }
    }

    /// Add content to the citation
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Override the derived domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Domain used for diversity accounting
    pub fn domain_key(&self) -> String {
        if self.domain.is_empty() {
            extract_domain(&self.url).unwrap_or_else(|| self.url.clone())
        } else {
            self.domain.to_lowercase()
        }
    }
}

/// Extract the host from a URL, lowercased.
pub fn extract_domain(url: &str) -> Option<String> {
    let host = url
        .split("//")
        .nth(1)?
        .split(['/', '?', '#'])
        .next()?
        .to_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// What the user is trying to achieve with the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Open-ended research needing sources
    Research,
    /// A single fact lookup
    Factual,
    /// Comparing alternatives
    Comparison,
    /// Explaining a concept
    Explanation,
    /// Small talk, no evidence needed
    Conversational,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Output of the query analysis step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub intent: Intent,
    /// Complexity score (0.0 to 10.0)
    pub complexity_score: f32,
    pub requires_citations: bool,
}

impl QueryAnalysis {
    /// Create a new analysis, clamping the complexity score
    pub fn new(intent: Intent, complexity_score: f32, requires_citations: bool) -> Self {
        Self {
            intent,
            complexity_score: complexity_score.clamp(0.0, 10.0),
            requires_citations,
        }
    }
}

/// Reasoning strategy chosen for the final answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningMethod {
    /// Answer directly from the evidence
    Direct,
    /// Step-by-step derivation
    ChainOfThought,
    /// Side-by-side evaluation of alternatives
    Comparative,
    /// Decompose, evaluate each part, synthesize
    Analytical,
}

impl ReasoningMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::ChainOfThought => "chain_of_thought",
            Self::Comparative => "comparative",
            Self::Analytical => "analytical",
        }
    }
}

/// The answer produced by the reasoning execution step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResponse {
    pub raw_text: String,
    pub structured_output: Option<Value>,
    pub method: Option<ReasoningMethod>,
}

impl FinalResponse {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            structured_output: None,
            method: None,
        }
    }

    pub fn with_method(mut self, method: ReasoningMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_structured_output(mut self, output: Value) -> Self {
        self.structured_output = Some(output);
        self
    }
}

/// Breadcrumbs a step can leave for the router
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingSignals {
    /// The citation source has nothing new to offer; stop retrying it
    pub sources_exhausted: bool,
    /// A reformulated query for the next citation round
    pub refined_query: Option<String>,
}

impl RoutingSignals {
    /// Fold another branch's signals into these (flags OR, last value wins)
    pub fn merge(&mut self, other: &RoutingSignals) {
        self.sources_exhausted |= other.sources_exhausted;
        if other.refined_query.is_some() {
            self.refined_query = other.refined_query.clone();
        }
    }
}

/// Counters and history owned by the router and orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookkeeping {
    /// Routing decisions taken since the run started
    pub iteration_count: usize,
    pub visited_steps: BTreeSet<String>,
    /// Transport retries per step, at most `MAX_RETRIES` each
    pub retry_counts: BTreeMap<String, usize>,
    /// Router loop-backs per target step, counted apart from transport retries
    #[serde(default)]
    pub loop_counts: BTreeMap<String, usize>,
    pub quality_history: BTreeMap<String, QualityAssessment>,
    /// Step currently executing (or last routed from)
    pub current_step: Option<String>,
    /// How many times the router sent the run back for more citations
    pub citation_improvement_round: u32,
    /// Whether the post-answer improvement loop has already run
    pub response_improvement_done: bool,
    /// Set when the router forced the run to end on the iteration cap
    pub iteration_budget_exhausted: bool,
}

impl Bookkeeping {
    /// Fold a fan-out branch's bookkeeping into this one
    pub(crate) fn merge(&mut self, other: &Bookkeeping) {
        self.iteration_count = self.iteration_count.max(other.iteration_count);
        self.visited_steps.extend(other.visited_steps.iter().cloned());
        for (step, count) in &other.retry_counts {
            let entry = self.retry_counts.entry(step.clone()).or_insert(0);
            *entry = (*entry).max(*count);
        }
        for (step, count) in &other.loop_counts {
            let entry = self.loop_counts.entry(step.clone()).or_insert(0);
            *entry = (*entry).max(*count);
        }
        for (step, quality) in &other.quality_history {
            self.quality_history.insert(step.clone(), quality.clone());
        }
        self.citation_improvement_round = self
            .citation_improvement_round
            .max(other.citation_improvement_round);
        self.response_improvement_done |= other.response_improvement_done;
        self.iteration_budget_exhausted |= other.iteration_budget_exhausted;
    }
}

/// Kind of change recorded in the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transition {
    Created,
    QueryAnalyzed { complexity_score: f32 },
    CitationsUpdated { count: usize },
    ReasoningSelected { method: ReasoningMethod },
    ResponseProduced { chars: usize },
    MetadataUpdated { key: String },
    SignalsUpdated,
    BranchesMerged { branches: usize },
    Failed { message: String },
    Completed,
}

/// One entry of the append-only audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub step: Option<String>,
    pub change: Transition,
    pub at: DateTime<Utc>,
}

/// How a run ended, derived from a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Not terminal yet
    Running,
    /// Completed with an answer and no error
    Succeeded,
    /// An error is attached
    Failed,
    /// The iteration cap ended the run without an answer or an error
    GaveUp,
}

/// Snapshot of a run's bookkeeping, as exposed to progress queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub session_id: String,
    pub iteration_count: usize,
    pub current_step: Option<String>,
    pub visited_steps: Vec<String>,
    pub retry_counts: BTreeMap<String, usize>,
    pub loop_counts: BTreeMap<String, usize>,
    pub citation_count: usize,
    pub latest_quality: Option<f64>,
    pub outcome: RunOutcome,
}

/// The state of one research workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Stable identifier for the run
    pub session_id: String,

    /// Original user request
    pub query: String,

    /// Opaque user profile handed to downstream steps
    pub user_profile: Value,

    /// Opaque prompt configuration handed to downstream steps
    pub prompt_config: Value,

    /// Accumulated evidence, in retrieval order
    pub citations: Vec<Citation>,

    pub query_analysis: Option<QueryAnalysis>,

    pub selected_reasoning_method: Option<ReasoningMethod>,

    /// Presence signals the workflow has produced an answer
    pub final_response: Option<FinalResponse>,

    pub signals: RoutingSignals,

    /// Free-form notes between steps that the router never reads
    pub metadata: BTreeMap<String, Value>,

    pub error: Option<WorkflowFailure>,

    pub is_complete: bool,

    pub start_time: DateTime<Utc>,

    pub end_time: Option<DateTime<Utc>>,

    bookkeeping: Bookkeeping,

    processing_steps: Vec<ProcessingRecord>,
}

impl WorkItem {
    /// Create the initial work item for a run
    pub fn new(
        session_id: impl Into<String>,
        query: impl Into<String>,
        user_profile: Value,
        prompt_config: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            query: query.into(),
            user_profile,
            prompt_config,
            citations: Vec::new(),
            query_analysis: None,
            selected_reasoning_method: None,
            final_response: None,
            signals: RoutingSignals::default(),
            metadata: BTreeMap::new(),
            error: None,
            is_complete: false,
            start_time: now,
            end_time: None,
            bookkeeping: Bookkeeping::default(),
            processing_steps: vec![ProcessingRecord {
                step: None,
                change: Transition::Created,
                at: now,
            }],
        }
    }

    /// Convenience constructor with empty profile and prompt config
    pub fn for_query(session_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self::new(session_id, query, Value::Null, Value::Null)
    }

    // ---------------------------------------------------------------------
    // Transitions
    // ---------------------------------------------------------------------

    /// Record the query analysis
    pub fn with_query_analysis(&self, analysis: QueryAnalysis) -> Self {
        let change = Transition::QueryAnalyzed {
            complexity_score: analysis.complexity_score,
        };
        self.transition(change, |item| item.query_analysis = Some(analysis))
    }

    /// Replace the citation list
    pub fn with_citations(&self, citations: Vec<Citation>) -> Self {
        let change = Transition::CitationsUpdated {
            count: citations.len(),
        };
        self.transition(change, |item| item.citations = citations)
    }

    /// Record the selected reasoning method
    pub fn with_reasoning(&self, method: ReasoningMethod) -> Self {
        self.transition(Transition::ReasoningSelected { method }, |item| {
            item.selected_reasoning_method = Some(method)
        })
    }

    /// Record the final response
    pub fn with_response(&self, response: FinalResponse) -> Self {
        let change = Transition::ResponseProduced {
            chars: response.raw_text.chars().count(),
        };
        self.transition(change, |item| item.final_response = Some(response))
    }

    /// Attach a failure; the result is terminal
    pub fn with_error(&self, failure: WorkflowFailure) -> Self {
        let change = Transition::Failed {
            message: failure.to_string(),
        };
        self.transition(change, |item| {
            item.error = Some(failure);
            item.end_time = Some(Utc::now());
        })
    }

    /// Set a free-form metadata entry
    pub fn with_metadata(&self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        let change = Transition::MetadataUpdated { key: key.clone() };
        self.transition(change, |item| {
            item.metadata.insert(key, value);
        })
    }

    /// Replace the routing signals
    pub fn with_signals(&self, signals: RoutingSignals) -> Self {
        self.transition(Transition::SignalsUpdated, |item| item.signals = signals)
    }

    /// Mark the run as finished without error
    pub(crate) fn completed(&self) -> Self {
        self.transition(Transition::Completed, |item| {
            item.is_complete = true;
            item.end_time = Some(Utc::now());
        })
    }

    fn transition(&self, change: Transition, apply: impl FnOnce(&mut WorkItem)) -> Self {
        if self.is_terminal() {
            warn!(
                session_id = %self.session_id,
                change = ?change,
                "Ignoring transition on a terminal work item"
            );
            return self.clone();
        }
        let mut next = self.clone();
        apply(&mut next);
        next.processing_steps.push(ProcessingRecord {
            step: self.bookkeeping.current_step.clone(),
            change,
            at: Utc::now(),
        });
        next
    }

    // ---------------------------------------------------------------------
    // Bookkeeping (router / orchestrator only)
    // ---------------------------------------------------------------------

    pub(crate) fn bookkeeping_mut(&mut self) -> &mut Bookkeeping {
        &mut self.bookkeeping
    }

    /// Copy of `self` with `other`'s bookkeeping and terminal fields.
    ///
    /// Applied to every step output so a step can only change the evidence
    /// it is responsible for.
    pub(crate) fn with_owned_fields_from(mut self, other: &WorkItem) -> Self {
        self.bookkeeping = other.bookkeeping.clone();
        self.session_id = other.session_id.clone();
        self.error = other.error.clone();
        self.is_complete = other.is_complete;
        self.start_time = other.start_time;
        self.end_time = other.end_time;
        if self.processing_steps.len() < other.processing_steps.len()
            || self.processing_steps[..other.processing_steps.len()] != other.processing_steps[..]
        {
            self.processing_steps = other.processing_steps.clone();
        }
        self
    }

    /// Increment the retry count for a step
    pub(crate) fn increment_retry_count(&mut self, step: &str) -> usize {
        let count = self.bookkeeping.retry_counts.entry(step.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Increment the router loop-back count for a step
    pub(crate) fn increment_loop_count(&mut self, step: &str) -> usize {
        let count = self.bookkeeping.loop_counts.entry(step.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Fold concurrent branch outputs into one item.
    ///
    /// All branches started from `base`. The first branch (in branch order)
    /// carrying an error wins. Otherwise citations are extended by each
    /// branch's additions (a branch that rewrote the list replaces it),
    /// metadata is merged key-wise with later branches overwriting earlier
    /// ones, and bookkeeping and signals are merged.
    pub fn merge_branches(base: &WorkItem, branches: Vec<WorkItem>) -> WorkItem {
        let branch_count = branches.len();
        let mut merged = base.clone();

        for branch in &branches {
            merged.bookkeeping.merge(&branch.bookkeeping);
        }

        if let Some(failure) = branches.iter().find_map(|b| b.error.clone()) {
            return merged.with_error(failure);
        }

        for branch in branches {
            let extends_base = branch.citations.len() >= base.citations.len()
                && branch.citations[..base.citations.len()] == base.citations[..];
            if extends_base {
                merged
                    .citations
                    .extend(branch.citations[base.citations.len()..].iter().cloned());
            } else {
                merged.citations = branch.citations.clone();
            }

            if branch.query_analysis != base.query_analysis {
                merged.query_analysis = branch.query_analysis.clone();
            }
            if branch.selected_reasoning_method != base.selected_reasoning_method {
                merged.selected_reasoning_method = branch.selected_reasoning_method;
            }
            if branch.final_response != base.final_response {
                merged.final_response = branch.final_response.clone();
            }

            merged.signals.merge(&branch.signals);
            merged.metadata.extend(branch.metadata);

            let base_len = base.processing_steps.len().min(branch.processing_steps.len());
            merged
                .processing_steps
                .extend(branch.processing_steps.into_iter().skip(base_len));
        }

        merged.transition(
            Transition::BranchesMerged {
                branches: branch_count,
            },
            |_| {},
        )
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Read-only view of the bookkeeping fields
    pub fn bookkeeping(&self) -> &Bookkeeping {
        &self.bookkeeping
    }

    /// Append-only audit trail
    pub fn processing_steps(&self) -> &[ProcessingRecord] {
        &self.processing_steps
    }

    pub fn iteration_count(&self) -> usize {
        self.bookkeeping.iteration_count
    }

    /// Retry count recorded for a step (0 if never retried)
    pub fn retry_count(&self, step: &str) -> usize {
        self.bookkeeping.retry_counts.get(step).copied().unwrap_or(0)
    }

    /// How many times the router has sent the run back to `step`
    pub fn loop_count(&self, step: &str) -> usize {
        self.bookkeeping.loop_counts.get(step).copied().unwrap_or(0)
    }

    pub fn has_visited(&self, step: &str) -> bool {
        self.bookkeeping.visited_steps.contains(step)
    }

    /// Quality assessment recorded after a step
    pub fn quality_for(&self, step: &str) -> Option<&QualityAssessment> {
        self.bookkeeping.quality_history.get(step)
    }

    /// Whether the analysis (if any) asks for supporting citations
    pub fn requires_citations(&self) -> bool {
        self.query_analysis
            .as_ref()
            .map(|a| a.requires_citations)
            .unwrap_or(true)
    }

    /// Terminal once complete or failed
    pub fn is_terminal(&self) -> bool {
        self.is_complete || self.error.is_some()
    }

    /// Derive the run outcome
    pub fn outcome(&self) -> RunOutcome {
        if self.error.is_some() {
            RunOutcome::Failed
        } else if !self.is_complete {
            RunOutcome::Running
        } else if self.final_response.is_some() {
            RunOutcome::Succeeded
        } else {
            RunOutcome::GaveUp
        }
    }

    /// Snapshot of bookkeeping for progress reporting
    pub fn progress(&self) -> ProgressSnapshot {
        let latest_quality = self
            .bookkeeping
            .current_step
            .as_deref()
            .and_then(|s| self.bookkeeping.quality_history.get(s))
            .map(|q| q.overall);
        ProgressSnapshot {
            session_id: self.session_id.clone(),
            iteration_count: self.bookkeeping.iteration_count,
            current_step: self.bookkeeping.current_step.clone(),
            visited_steps: self.bookkeeping.visited_steps.iter().cloned().collect(),
            retry_counts: self.bookkeeping.retry_counts.clone(),
            loop_counts: self.bookkeeping.loop_counts.clone(),
            citation_count: self.citations.len(),
            latest_quality,
            outcome: self.outcome(),
        }
    }

    /// Generate a formatted source list for prompts
    pub fn format_citations(&self) -> String {
        self.citations
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{}] {}: {}", i + 1, c.title, c.url))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use serde_json::json;

    fn item() -> WorkItem {
        WorkItem::for_query("session-1", "What is context engineering?")
    }

    #[test]
    fn test_new_work_item() {
        let state = item();
        assert_eq!(state.session_id, "session-1");
        assert!(state.citations.is_empty());
        assert_eq!(state.iteration_count(), 0);
        assert_eq!(state.outcome(), RunOutcome::Running);
        assert_eq!(state.processing_steps().len(), 1);
        assert_eq!(state.processing_steps()[0].change, Transition::Created);
    }

    #[test]
    fn test_citation_relevance_clamping() {
        assert_eq!(Citation::new("t", "https://a.com", 1.5).relevance_score, 1.0);
        assert_eq!(Citation::new("t", "https://a.com", -0.5).relevance_score, 0.0);
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.Example.com/page?q=1"),
            Some("www.example.com".to_string())
        );
        assert_eq!(extract_domain("rust-lang.org"), None);
        let citation = Citation::new("t", "https://docs.rs/tokio", 0.5);
        assert_eq!(citation.domain, "docs.rs");
    }

    #[test]
    fn test_with_citations_does_not_mutate_input() {
        let state = item();
        let next = state.with_citations(vec![Citation::new("A", "https://a.com", 0.8)]);

        assert!(state.citations.is_empty());
        assert_eq!(next.citations.len(), 1);
        assert_eq!(next.processing_steps().len(), state.processing_steps().len() + 1);
        assert_eq!(
            next.processing_steps().last().map(|r| &r.change),
            Some(&Transition::CitationsUpdated { count: 1 })
        );
    }

    #[test]
    fn test_transitions_apply_one_change_each() {
        let state = item()
            .with_query_analysis(QueryAnalysis::new(Intent::Research, 7.0, true))
            .with_reasoning(ReasoningMethod::Analytical)
            .with_response(FinalResponse::new("answer"));

        assert_eq!(state.query_analysis.as_ref().map(|a| a.intent), Some(Intent::Research));
        assert_eq!(state.selected_reasoning_method, Some(ReasoningMethod::Analytical));
        assert!(state.final_response.is_some());
        assert_eq!(state.processing_steps().len(), 4);
    }

    #[test]
    fn test_complexity_clamped() {
        let analysis = QueryAnalysis::new(Intent::Factual, 42.0, false);
        assert_eq!(analysis.complexity_score, 10.0);
    }

    #[test]
    fn test_error_makes_item_terminal() {
        let state = item();
        let failed = state.with_error(WorkflowFailure::routing(Some("x"), "dead end"));

        assert!(state.error.is_none());
        assert!(failed.is_terminal());
        assert!(failed.end_time.is_some());
        assert_eq!(failed.outcome(), RunOutcome::Failed);

        // Transitions on a terminal item are ignored
        let after = failed.with_citations(vec![Citation::new("A", "https://a.com", 0.8)]);
        assert!(after.citations.is_empty());
        assert_eq!(after.processing_steps().len(), failed.processing_steps().len());
    }

    #[test]
    fn test_outcomes() {
        let done = item().with_response(FinalResponse::new("ok")).completed();
        assert_eq!(done.outcome(), RunOutcome::Succeeded);

        let gave_up = item().completed();
        assert_eq!(gave_up.outcome(), RunOutcome::GaveUp);
    }

    #[test]
    fn test_owned_fields_restored_from_input() {
        let mut input = item();
        input.increment_retry_count("citation_fetch");

        let mut tampered = input.with_citations(vec![Citation::new("A", "https://a.com", 0.8)]);
        tampered.is_complete = true;
        tampered.bookkeeping_mut().retry_counts.clear();

        let restored = tampered.with_owned_fields_from(&input);
        assert!(!restored.is_complete);
        assert_eq!(restored.retry_count("citation_fetch"), 1);
        assert_eq!(restored.citations.len(), 1);
        assert_eq!(restored.processing_steps().len(), input.processing_steps().len() + 1);
    }

    #[test]
    fn test_merge_branches_unions_citations_and_metadata() {
        let base = item().with_citations(vec![Citation::new("Base", "https://base.com", 0.5)]);

        let left = base
            .with_citations(vec![
                Citation::new("Base", "https://base.com", 0.5),
                Citation::new("L", "https://left.com", 0.9),
            ])
            .with_metadata("left_query", json!("q1"))
            .with_metadata("shared", json!("left"));
        let right = base
            .with_citations(vec![
                Citation::new("Base", "https://base.com", 0.5),
                Citation::new("R", "https://right.com", 0.7),
            ])
            .with_metadata("right_query", json!("q2"))
            .with_metadata("shared", json!("right"));

        let merged = WorkItem::merge_branches(&base, vec![left, right]);

        assert!(merged.error.is_none());
        let titles: Vec<_> = merged.citations.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Base", "L", "R"]);
        assert_eq!(merged.metadata["left_query"], json!("q1"));
        assert_eq!(merged.metadata["right_query"], json!("q2"));
        assert_eq!(merged.metadata["shared"], json!("right"));
        assert_eq!(
            merged.processing_steps().last().map(|r| &r.change),
            Some(&Transition::BranchesMerged { branches: 2 })
        );
    }

    #[test]
    fn test_merge_branches_disjoint_metadata_commutes() {
        let base = item();
        let a = base.with_metadata("a", json!(1));
        let b = base.with_metadata("b", json!(2));

        let ab = WorkItem::merge_branches(&base, vec![a.clone(), b.clone()]);
        let ba = WorkItem::merge_branches(&base, vec![b, a]);
        assert_eq!(ab.metadata, ba.metadata);
    }

    #[test]
    fn test_merge_branches_error_wins() {
        let base = item();
        let ok = base.with_citations(vec![Citation::new("A", "https://a.com", 0.8)]);
        let failed = base.with_error(WorkflowFailure::routing(Some("b"), "boom"));

        let merged = WorkItem::merge_branches(&base, vec![ok, failed]);
        assert!(merged.error.is_some());
        assert_eq!(merged.error.as_ref().map(|e| e.kind), Some(FailureKind::Routing));
        assert!(merged.citations.is_empty());
    }

    #[test]
    fn test_merge_branches_takes_max_retry_counts() {
        let base = item();
        let mut a = base.clone();
        a.increment_retry_count("citation_fetch");
        let mut b = base.clone();
        b.increment_retry_count("citation_fetch");
        b.increment_retry_count("citation_fetch");
        b.increment_retry_count("citation_fetch_related");
        a.increment_loop_count("citation_fetch");

        let merged = WorkItem::merge_branches(&base, vec![a, b]);
        assert_eq!(merged.retry_count("citation_fetch"), 2);
        assert_eq!(merged.retry_count("citation_fetch_related"), 1);
        assert_eq!(merged.loop_count("citation_fetch"), 1);
    }

    #[test]
    fn test_signals_merge() {
        let mut signals = RoutingSignals::default();
        signals.merge(&RoutingSignals {
            sources_exhausted: true,
            refined_query: Some("narrower".into()),
        });
        signals.merge(&RoutingSignals::default());
        assert!(signals.sources_exhausted);
        assert_eq!(signals.refined_query.as_deref(), Some("narrower"));
    }

    #[test]
    fn test_progress_snapshot() {
        let mut state = item().with_citations(vec![Citation::new("A", "https://a.com", 0.8)]);
        state.bookkeeping_mut().iteration_count = 3;
        state.bookkeeping_mut().current_step = Some("citation_fetch".into());
        state.increment_retry_count("citation_fetch");
        state.increment_loop_count("citation_fetch");
        state.increment_loop_count("citation_fetch");

        let progress = state.progress();
        assert_eq!(progress.iteration_count, 3);
        assert_eq!(progress.citation_count, 1);
        assert_eq!(progress.retry_counts.get("citation_fetch"), Some(&1));
        assert_eq!(progress.loop_counts.get("citation_fetch"), Some(&2));
        assert_eq!(progress.outcome, RunOutcome::Running);
    }

    #[test]
    fn test_format_citations() {
        let state = item().with_citations(vec![
            Citation::new("Source A", "https://a.com", 0.9),
            Citation::new("Source B", "https://b.com", 0.8),
        ]);
        let formatted = state.format_citations();
        assert!(formatted.contains("[1] Source A: https://a.com"));
        assert!(formatted.contains("[2] Source B: https://b.com"));
    }

    #[test]
    fn test_intent_deserializes_unknown() {
        let intent: Intent = serde_json::from_str("\"poetry\"").unwrap();
        assert_eq!(intent, Intent::Unknown);
        let intent: Intent = serde_json::from_str("\"research\"").unwrap();
        assert_eq!(intent, Intent::Research);
    }
}
