//! # research-flow
//!
//! Adaptive research workflow orchestrator. A run analyzes a query, gathers
//! citations when the query needs them, picks a reasoning method and produces
//! an answer. A router decides after every step what runs next, looping back
//! for more evidence when quality is low; retry and iteration budgets
//! guarantee every run terminates.
//!
//! ## Quick Start
//!
//! ```ignore
//! use research_flow::prelude::*;
//! use std::sync::Arc;
//!
//! let service = ResearchWorkflowBuilder::new()
//!     .citation_source(Arc::new(my_search))
//!     .reasoning_provider(Arc::new(my_llm))
//!     .build_service()?;
//!
//! let item = service
//!     .run(ResearchService::new_session_id(), "What is context engineering?", json!({}), json!({}))
//!     .await?;
//! match item.outcome() {
//!     RunOutcome::Succeeded => println!("{}", item.final_response.unwrap().raw_text),
//!     other => eprintln!("run ended: {:?} {:?}", other, item.error),
//! }
//! ```

pub mod error;
pub mod providers;
pub mod research;
pub mod workflow;

pub use error::{ErrorClass, FailureKind, OrchestratorError, StepError, WorkflowFailure};

/// Commonly used types
pub mod prelude {
    pub use crate::error::{FailureKind, OrchestratorError, StepError, WorkflowFailure};
    pub use crate::providers::{
        CitationError, CitationSource, Completion, CompletionError, HeuristicQueryAnalyzer,
        PromptContext, ProviderError, QueryAnalyzer, ReasoningProvider,
    };
    pub use crate::research::{
        Citation, FinalResponse, Intent, ProgressSnapshot, QualityAssessment, QueryAnalysis,
        ReasoningMethod, ResearchWorkflowBuilder, RunOutcome, WorkItem,
    };
    pub use crate::workflow::{
        Orchestrator, OrchestratorConfig, ResearchService, RetryPolicy, RouterConfig, Step,
        StepRegistry,
    };
}
