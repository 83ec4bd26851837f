//! Research domain: work item state, evidence quality, and the concrete
//! steps of the adaptive research workflow.
//!
//! # Module Structure
//!
//! - `state` - The work item threaded through a run, plus citations and decisions
//! - `quality` - Aggregate quality signal over gathered citations
//! - `steps` - Query analysis, citation fetch, reasoning selection and execution
//! - `workflow` - Builder wiring collaborators into an orchestrator

pub mod quality;
pub mod state;
pub mod steps;
pub mod workflow;

// Re-exports for convenience
pub use quality::{assess, QualityAssessment, QualityAssessor};
pub use state::{
    Bookkeeping, Citation, FinalResponse, Intent, ProcessingRecord, ProgressSnapshot,
    QueryAnalysis, ReasoningMethod, RoutingSignals, RunOutcome, Transition, WorkItem,
};
pub use steps::{
    CitationFetchStep, CitationStrategy, QueryAnalysisStep, ReasoningExecutionStep,
    ReasoningSelectionStep,
};
pub use workflow::ResearchWorkflowBuilder;
