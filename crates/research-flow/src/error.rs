//! Error types for the research workflow
//!
//! Step failures are classified into retryable transport errors and fatal
//! errors. The orchestrator never lets a `StepError` escape: it converts it
//! into a [`WorkflowFailure`] recorded on the terminal work item.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message fragments that mark an otherwise opaque provider error as transient.
const RETRYABLE_MARKERS: &[&str] = &[
    "rate limit",
    "too many requests",
    "service unavailable",
    "timed out",
    "timeout",
    "connection refused",
    "connection reset",
    "connection closed",
];

/// Whether a failed step may be executed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Timeouts, connection failures, rate limits, unavailable services
    Retryable,
    /// Authentication/configuration problems and malformed input
    Fatal,
}

/// Error returned by a step's `run` operation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Opaque collaborator failure, classified by its message
    #[error("Provider error: {0}")]
    Provider(String),
}

impl StepError {
    /// Create an opaque provider error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Classify the error for the retry policy
    pub fn class(&self) -> ErrorClass {
        match self {
            StepError::Timeout(_)
            | StepError::Connection(_)
            | StepError::RateLimited(_)
            | StepError::ServiceUnavailable(_) => ErrorClass::Retryable,
            StepError::Provider(message) => {
                let lowered = message.to_lowercase();
                if RETRYABLE_MARKERS.iter().any(|m| lowered.contains(m)) {
                    ErrorClass::Retryable
                } else {
                    ErrorClass::Fatal
                }
            }
            StepError::Authentication(_)
            | StepError::Configuration(_)
            | StepError::InvalidInput(_) => ErrorClass::Fatal,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

/// Category of a failure recorded on a terminal work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A retryable error that outlived the retry budget
    RetriesExhausted,
    /// A non-retryable step error
    Fatal,
    /// Controller-level condition: unknown step, missing step, dead end
    Routing,
    /// The run was cancelled through its session handle
    Cancelled,
    /// The whole workflow exceeded its wall-clock budget
    WorkflowTimeout,
}

/// The single source of truth for why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFailure {
    pub kind: FailureKind,
    /// Step that was executing (or being routed from) when the run failed
    pub step: Option<String>,
    pub message: String,
    /// Executions of the failing step in its last invocation, including the failed one
    pub attempts: usize,
}

impl WorkflowFailure {
    /// Build a failure from a step error
    pub fn from_step_error(step: impl Into<String>, error: &StepError, attempts: usize) -> Self {
        let kind = if error.is_retryable() {
            FailureKind::RetriesExhausted
        } else {
            FailureKind::Fatal
        };
        Self {
            kind,
            step: Some(step.into()),
            message: error.to_string(),
            attempts,
        }
    }

    /// Create a routing failure
    pub fn routing(step: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Routing,
            step: step.map(str::to_string),
            message: message.into(),
            attempts: 0,
        }
    }

    /// Create a cancellation failure
    pub fn cancelled(step: Option<&str>) -> Self {
        Self {
            kind: FailureKind::Cancelled,
            step: step.map(str::to_string),
            message: "workflow cancelled".to_string(),
            attempts: 0,
        }
    }

    /// Create a workflow timeout failure
    pub fn workflow_timeout(duration: std::time::Duration) -> Self {
        Self {
            kind: FailureKind::WorkflowTimeout,
            step: None,
            message: format!("workflow timeout after {:?}", duration),
            attempts: 0,
        }
    }
}

impl std::fmt::Display for WorkflowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.step {
            Some(step) => write!(f, "{:?} in {}: {}", self.kind, step, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// Errors raised while assembling an orchestrator or driving a session
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Step already registered: {0}")]
    DuplicateStep(String),

    #[error("Required step not registered: {0}")]
    MissingStep(String),

    #[error("Session already running: {0}")]
    SessionActive(String),
}

impl OrchestratorError {
    /// Create a config error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    static_assertions::assert_impl_all!(super::StepError: Send, Sync);
    static_assertions::assert_impl_all!(super::OrchestratorError: Send, Sync);
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(StepError::Timeout("search".into()).is_retryable());
        assert!(StepError::connection("refused").is_retryable());
        assert!(StepError::RateLimited("429".into()).is_retryable());
        assert!(StepError::ServiceUnavailable("503".into()).is_retryable());
    }

    #[test]
    fn test_fatal_errors_are_not_retryable() {
        assert!(!StepError::Authentication("bad key".into()).is_retryable());
        assert!(!StepError::Configuration("no endpoint".into()).is_retryable());
        assert!(!StepError::InvalidInput("empty query".into()).is_retryable());
    }

    #[test]
    fn test_provider_errors_classified_by_marker() {
        assert!(StepError::provider("upstream said: Rate Limit exceeded").is_retryable());
        assert!(StepError::provider("503 Service Unavailable").is_retryable());
        assert!(StepError::provider("dial tcp: connection refused").is_retryable());
        assert!(!StepError::provider("model not found").is_retryable());
    }

    #[test]
    fn test_failure_from_step_error() {
        let failure =
            WorkflowFailure::from_step_error("citation_fetch", &StepError::connection("x"), 4);
        assert_eq!(failure.kind, FailureKind::RetriesExhausted);
        assert_eq!(failure.step.as_deref(), Some("citation_fetch"));
        assert_eq!(failure.attempts, 4);

        let fatal = WorkflowFailure::from_step_error(
            "query_analysis",
            &StepError::Authentication("denied".into()),
            1,
        );
        assert_eq!(fatal.kind, FailureKind::Fatal);

        // Step errors never read as a cancellation; only the session handle cancels
        let provider = WorkflowFailure::from_step_error("x", &StepError::provider("aborted"), 1);
        assert_eq!(provider.kind, FailureKind::Fatal);
        assert_eq!(WorkflowFailure::cancelled(Some("x")).kind, FailureKind::Cancelled);
    }

    #[test]
    fn test_failure_display() {
        let failure = WorkflowFailure::routing(Some("mystery"), "unknown step");
        let text = failure.to_string();
        assert!(text.contains("mystery"));
        assert!(text.contains("unknown step"));
    }
}
