//! Collaborator boundaries
//!
//! The research steps talk to the outside world only through these traits:
//! a query analyzer, a citation source and a reasoning (completion) provider.
//! Each carries its own error type which classifies itself as retryable or
//! fatal and converts into a [`StepError`].

pub mod heuristic;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::StepError;
use crate::research::state::{Citation, QueryAnalysis, ReasoningMethod};

pub use heuristic::HeuristicQueryAnalyzer;

// =============================================================================
// Errors
// =============================================================================

/// Error from a query analyzer
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout
                | ProviderError::Connection(_)
                | ProviderError::RateLimited
                | ProviderError::Unavailable(_)
        )
    }
}

impl From<ProviderError> for StepError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Timeout => StepError::Timeout("query analysis".to_string()),
            ProviderError::Connection(msg) => StepError::Connection(msg),
            ProviderError::RateLimited => StepError::RateLimited("query analyzer".to_string()),
            ProviderError::Unavailable(msg) => StepError::ServiceUnavailable(msg),
            ProviderError::Unauthorized(msg) => StepError::Authentication(msg),
            ProviderError::InvalidResponse(msg) => StepError::InvalidInput(msg),
            ProviderError::Other(msg) => StepError::Provider(msg),
        }
    }
}

/// Error from a citation source
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CitationError {
    #[error("Search timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Unauthorized - check credentials")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Failed to parse results: {0}")]
    Parse(String),

    #[error("Search configuration error: {0}")]
    Configuration(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl CitationError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CitationError::Timeout
                | CitationError::Connection(_)
                | CitationError::RateLimited
                | CitationError::ServerError(_, _)
        )
    }
}

impl From<CitationError> for StepError {
    fn from(e: CitationError) -> Self {
        match e {
            CitationError::Timeout => StepError::Timeout("citation search".to_string()),
            CitationError::Connection(msg) => StepError::Connection(msg),
            CitationError::RateLimited => StepError::RateLimited("citation source".to_string()),
            CitationError::ServerError(status, body) => {
                StepError::ServiceUnavailable(format!("HTTP {}: {}", status, body))
            }
            CitationError::Unauthorized => {
                StepError::Authentication("citation source rejected the credentials".to_string())
            }
            CitationError::BadRequest(msg) => StepError::InvalidInput(msg),
            CitationError::Configuration(msg) => StepError::Configuration(msg),
            CitationError::Parse(msg) => StepError::Provider(format!("unparseable results: {}", msg)),
            CitationError::Unknown(msg) => StepError::Provider(msg),
        }
    }
}

/// Error from a reasoning provider
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompletionError {
    #[error("Completion timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Rate limited - too many requests")]
    RateLimited,

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Empty completion")]
    Empty,

    #[error("Completion error: {0}")]
    Other(String),
}

impl CompletionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::Timeout
            | CompletionError::Connection(_)
            | CompletionError::RateLimited
            | CompletionError::Unavailable(_) => true,
            CompletionError::Other(msg) => StepError::provider(msg.clone()).is_retryable(),
            CompletionError::Authentication(_) | CompletionError::Empty => false,
        }
    }
}

impl From<CompletionError> for StepError {
    fn from(e: CompletionError) -> Self {
        match e {
            CompletionError::Timeout => StepError::Timeout("completion".to_string()),
            CompletionError::Connection(msg) => StepError::Connection(msg),
            CompletionError::RateLimited => StepError::RateLimited("reasoning provider".to_string()),
            CompletionError::Unavailable(msg) => StepError::ServiceUnavailable(msg),
            CompletionError::Authentication(msg) => StepError::Authentication(msg),
            CompletionError::Empty => StepError::InvalidInput("empty completion".to_string()),
            CompletionError::Other(msg) => StepError::Provider(msg),
        }
    }
}

// =============================================================================
// Collaborator traits
// =============================================================================

/// Classifies a query: intent, complexity, need for citations
#[async_trait]
pub trait QueryAnalyzer: Send + Sync {
    async fn analyze(&self, query: &str) -> Result<QueryAnalysis, ProviderError>;
}

/// Fetches supporting sources for a query
#[async_trait]
pub trait CitationSource: Send + Sync {
    /// Search for up to `limit` citations
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Citation>, CitationError>;
}

/// Everything a reasoning provider needs to produce an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptContext {
    pub query: String,
    pub method: ReasoningMethod,
    pub citations: Vec<Citation>,
    /// Opaque prompt configuration from the work item
    pub prompt_config: Value,
    /// Opaque user profile from the work item
    pub user_profile: Value,
}

/// Raw output of a reasoning provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub raw_text: String,
    pub structured_output: Option<Value>,
}

impl Completion {
    pub fn text(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            structured_output: None,
        }
    }
}

/// Produces the final answer text
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn complete(&self, context: &PromptContext) -> Result<Completion, CompletionError>;
}
