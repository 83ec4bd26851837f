//! # Configuration Module
//!
//! Loads the agent configuration from environment variables (and a `.env`
//! file when present) and maps it onto the workflow engine's settings.

use anyhow::{Context, Result};
use research_flow::workflow::{OrchestratorConfig, MAX_TOTAL_ITERATIONS};
use std::env;
use std::time::Duration;

/// Default DuckDuckGo HTML endpoint
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Main configuration for the research agent.
#[derive(Debug, Clone)]
pub struct Config {
    /// The Ollama model to use (e.g., "llama3.2", "qwen2.5")
    pub model: String,

    /// Ollama server URL (default: http://localhost:11434)
    pub ollama_host: String,

    /// Temperature for LLM responses (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,

    /// Citations requested per search round
    pub max_search_results: usize,

    /// Search endpoint queried by the citation source
    pub search_endpoint: String,

    /// Routing decisions allowed per run
    pub max_total_iterations: usize,

    /// Wall-clock limit for a single step attempt
    pub step_timeout: Duration,

    /// Wall-clock limit for the whole run, if any
    pub workflow_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            temperature: 0.7,
            max_search_results: 5,
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            max_total_iterations: MAX_TOTAL_ITERATIONS,
            step_timeout: Duration::from_secs(120),
            workflow_timeout: None,
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Example
    /// ```ignore
    /// let config = Config::from_env()?;
    /// println!("Using model: {}", config.model);
    /// ```
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (silently ignore if not found)
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(val) = lookup("OLLAMA_MODEL") {
            config.model = val;
        }

        if let Some(val) = lookup("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }

        if let Some(val) = lookup("TEMPERATURE") {
            config.temperature = val
                .parse()
                .context("TEMPERATURE must be a valid floating-point number (e.g., 0.7)")?;
        }

        if let Some(val) = lookup("MAX_SEARCH_RESULTS") {
            config.max_search_results = val
                .parse()
                .context("MAX_SEARCH_RESULTS must be a valid positive integer")?;
        }

        if let Some(val) = lookup("SEARCH_ENDPOINT") {
            config.search_endpoint = val;
        }

        if let Some(val) = lookup("MAX_TOTAL_ITERATIONS") {
            config.max_total_iterations = val
                .parse()
                .context("MAX_TOTAL_ITERATIONS must be a valid positive integer")?;
        }

        if let Some(val) = lookup("STEP_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("STEP_TIMEOUT_SECS must be a whole number of seconds")?;
            config.step_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("WORKFLOW_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("WORKFLOW_TIMEOUT_SECS must be a whole number of seconds")?;
            config.workflow_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "Temperature must be between 0.0 and 2.0, got: {}",
                self.temperature
            );
        }

        if self.max_search_results == 0 {
            anyhow::bail!("MAX_SEARCH_RESULTS must be at least 1");
        }

        if self.model.is_empty() {
            anyhow::bail!("OLLAMA_MODEL cannot be empty");
        }

        if !self.search_endpoint.starts_with("http") {
            anyhow::bail!(
                "SEARCH_ENDPOINT must be an http(s) URL, got: {}",
                self.search_endpoint
            );
        }

        self.orchestrator_config()
            .validate()
            .context("invalid workflow settings")?;

        Ok(())
    }

    /// Workflow engine settings derived from this configuration
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let config = OrchestratorConfig::default()
            .with_max_total_iterations(self.max_total_iterations)
            .with_step_timeout(self.step_timeout);
        match self.workflow_timeout {
            Some(limit) => config.with_workflow_timeout(limit),
            None => config,
        }
    }
}
