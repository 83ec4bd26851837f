//! Step abstraction and registry
//!
//! A step is one unit of work in the research workflow. The orchestrator
//! looks steps up by name in a [`StepRegistry`] that is frozen before the
//! first run.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{OrchestratorError, StepError};
use crate::research::state::WorkItem;

/// Entry marker; never executed
pub const START: &str = "start";
pub const QUERY_ANALYSIS: &str = "query_analysis";
pub const CITATION_FETCH: &str = "citation_fetch";
/// Secondary citation strategy used as a fan-out branch
pub const CITATION_FETCH_RELATED: &str = "citation_fetch_related";
pub const REASONING_SELECTION: &str = "reasoning_selection";
pub const REASONING_EXECUTION: &str = "reasoning_execution";
/// Terminal marker; never executed
pub const END: &str = "end";

/// Steps every research orchestrator must have registered
pub const REQUIRED_STEPS: [&str; 4] = [
    QUERY_ANALYSIS,
    CITATION_FETCH,
    REASONING_SELECTION,
    REASONING_EXECUTION,
];

/// A unit of work in the research workflow
///
/// Implementations must not rely on bookkeeping they write themselves: the
/// orchestrator restores counters, history and the terminal flags from the
/// input on every output.
#[async_trait]
pub trait Step: Send + Sync {
    /// Registry name of this step
    fn name(&self) -> &str;

    /// Pure precondition; when false the step is skipped and the input
    /// flows on unchanged
    fn should_run(&self, _state: &WorkItem) -> bool {
        true
    }

    /// Execute the step
    async fn run(&self, state: &WorkItem) -> Result<WorkItem, StepError>;
}

/// Name-keyed collection of steps
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn Step>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step under its own name
    pub fn register(&mut self, step: Arc<dyn Step>) -> Result<(), OrchestratorError> {
        let name = step.name().to_string();
        if name == START || name == END {
            return Err(OrchestratorError::config_error(format!(
                "'{}' is reserved and cannot be registered",
                name
            )));
        }
        if self.steps.contains_key(&name) {
            return Err(OrchestratorError::DuplicateStep(name));
        }
        self.steps.insert(name, step);
        Ok(())
    }

    /// Builder-style registration
    pub fn with_step(mut self, step: Arc<dyn Step>) -> Result<Self, OrchestratorError> {
        self.register(step)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Fail unless every name in `required` is registered
    pub fn ensure_registered(&self, required: &[&str]) -> Result<(), OrchestratorError> {
        match required.iter().find(|name| !self.contains(name)) {
            Some(missing) => Err(OrchestratorError::MissingStep(missing.to_string())),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry")
            .field("steps", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl Step for Echo {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, state: &WorkItem) -> Result<WorkItem, StepError> {
            Ok(state.clone())
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = StepRegistry::new()
            .with_step(Arc::new(Echo(QUERY_ANALYSIS)))
            .unwrap()
            .with_step(Arc::new(Echo(CITATION_FETCH)))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get(QUERY_ANALYSIS).is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec![CITATION_FETCH, QUERY_ANALYSIS]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = StepRegistry::new();
        registry.register(Arc::new(Echo(QUERY_ANALYSIS))).unwrap();
        let err = registry.register(Arc::new(Echo(QUERY_ANALYSIS))).unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateStep(name) if name == QUERY_ANALYSIS));
    }

    #[test]
    fn test_reserved_names_rejected() {
        let mut registry = StepRegistry::new();
        assert!(registry.register(Arc::new(Echo(START))).is_err());
        assert!(registry.register(Arc::new(Echo(END))).is_err());
    }

    #[test]
    fn test_ensure_registered() {
        let registry = StepRegistry::new()
            .with_step(Arc::new(Echo(QUERY_ANALYSIS)))
            .unwrap();
        let err = registry.ensure_registered(&REQUIRED_STEPS).unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingStep(name) if name == CITATION_FETCH));
    }

    #[tokio::test]
    async fn test_default_should_run() {
        let step = Echo(QUERY_ANALYSIS);
        let state = WorkItem::for_query("s", "q");
        assert!(step.should_run(&state));
        let out = step.run(&state).await.unwrap();
        assert_eq!(out.query, "q");
    }
}
