//! # Agent Module
//!
//! Ollama-backed collaborators for the research workflow, built on Rig:
//! - [`OllamaReasoningProvider`] writes the answer from the gathered citations
//! - [`LlmQueryAnalyzer`] asks the model to classify the query, falling back
//!   to the keyword heuristic when the model's reply cannot be parsed

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt;
use rig::providers::ollama;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use research_flow::providers::{
    Completion, CompletionError, HeuristicQueryAnalyzer, PromptContext, ProviderError,
    QueryAnalyzer, ReasoningProvider,
};
use research_flow::research::{Citation, QueryAnalysis, ReasoningMethod};

use crate::config::Config;

// =============================================================================
// SYSTEM PROMPTS
// =============================================================================
const REASONING_PREAMBLE: &str = r#"
You are a careful AI research assistant. Answer the user's question using the
numbered sources you are given.

IMPORTANT INSTRUCTIONS:
1. Cite sources inline as [n], matching the numbers in the source list
2. If the sources do not cover part of the question, say so instead of guessing
3. End with a short **Sources** list of the URLs you relied on
"#;

const ANALYSIS_PREAMBLE: &str = r#"
You classify research questions. Reply with a single JSON object and nothing else:
{"intent": "...", "complexity_score": 0.0, "requires_citations": true}

- intent: one of "research", "factual", "comparison", "explanation", "conversational"
- complexity_score: 0 (trivial) to 10 (multi-part expert analysis)
- requires_citations: false only for greetings and small talk
"#;

// =============================================================================
// OLLAMA BACKEND
// =============================================================================
/// Connection settings shared by the Ollama collaborators.
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    model: String,
    temperature: f32,
}

impl OllamaBackend {
    pub fn new(config: &Config) -> Self {
        // Rig's Ollama client reads its base URL from the environment
        std::env::set_var("OLLAMA_API_BASE_URL", &config.ollama_host);
        debug!(host = %config.ollama_host, model = %config.model, "Using Ollama");

        Self {
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn prompt(&self, preamble: &str, prompt: &str) -> Result<String, String> {
        let client = ollama::Client::from_env();
        let agent = client
            .agent(&self.model)
            .preamble(preamble)
            .temperature(self.temperature as f64)
            .build();

        agent.prompt(prompt).await.map_err(|e| e.to_string())
    }
}

/// Map a failed model call onto the completion error taxonomy
fn classify_failure(message: String) -> CompletionError {
    let lowered = message.to_lowercase();
    if lowered.contains("timed out") || lowered.contains("timeout") {
        CompletionError::Timeout
    } else if lowered.contains("connection refused")
        || lowered.contains("connection reset")
        || lowered.contains("error sending request")
    {
        CompletionError::Connection(message)
    } else if lowered.contains("429") || lowered.contains("rate limit") {
        CompletionError::RateLimited
    } else if lowered.contains("503") || lowered.contains("service unavailable") {
        CompletionError::Unavailable(message)
    } else if lowered.contains("401") || lowered.contains("unauthorized") {
        CompletionError::Authentication(message)
    } else {
        CompletionError::Other(message)
    }
}

// =============================================================================
// REASONING PROVIDER
// =============================================================================
/// Produces the final answer with a local Ollama model.
#[derive(Debug, Clone)]
pub struct OllamaReasoningProvider {
    backend: OllamaBackend,
}

impl OllamaReasoningProvider {
    pub fn new(backend: OllamaBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ReasoningProvider for OllamaReasoningProvider {
    async fn complete(&self, context: &PromptContext) -> Result<Completion, CompletionError> {
        info!(
            model = %self.backend.model(),
            method = context.method.as_str(),
            citations = context.citations.len(),
            "Generating answer"
        );

        let prompt = build_reasoning_prompt(context);
        let text = self
            .backend
            .prompt(REASONING_PREAMBLE, &prompt)
            .await
            .map_err(classify_failure)?;

        if text.trim().is_empty() {
            return Err(CompletionError::Empty);
        }

        let structured_output = extract_json_block(&text);
        Ok(Completion {
            raw_text: text,
            structured_output,
        })
    }
}

fn method_instructions(method: ReasoningMethod) -> &'static str {
    match method {
        ReasoningMethod::Direct => "Answer directly and concisely.",
        ReasoningMethod::ChainOfThought => {
            "Work through the question step by step, then state the answer."
        }
        ReasoningMethod::Comparative => {
            "Compare the alternatives side by side: strengths, weaknesses, and when to choose each."
        }
        ReasoningMethod::Analytical => {
            "Break the question into parts, analyze each against the sources, then synthesize a conclusion."
        }
    }
}

fn format_sources(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return "(no sources were gathered)".to_string();
    }
    citations
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if c.content.is_empty() {
                format!("[{}] {} ({})", i + 1, c.title, c.url)
            } else {
                format!("[{}] {} ({})\n    {}", i + 1, c.title, c.url, c.content)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_reasoning_prompt(context: &PromptContext) -> String {
    let mut prompt = format!(
        "Question: {}\n\nApproach: {}\n\nSources:\n{}",
        context.query,
        method_instructions(context.method),
        format_sources(&context.citations)
    );

    if !is_blank(&context.user_profile) {
        prompt.push_str(&format!(
            "\n\nTailor the answer to this reader: {}",
            context.user_profile
        ));
    }
    if let Some(instructions) = context
        .prompt_config
        .get("instructions")
        .and_then(Value::as_str)
    {
        prompt.push_str(&format!("\n\nAdditional instructions: {}", instructions));
    }
    prompt
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Pull a fenced ```json block out of a reply, if there is one
fn extract_json_block(text: &str) -> Option<Value> {
    let start = text.find("```json")? + "```json".len();
    let end = text[start..].find("```")? + start;
    serde_json::from_str(text[start..end].trim()).ok()
}

// =============================================================================
// QUERY ANALYZER
// =============================================================================
#[derive(Debug, Error)]
enum AnalysisParseError {
    #[error("reply contains no JSON object")]
    NoJson,

    #[error("malformed analysis: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Classifies queries with the model, falling back to keyword heuristics.
#[derive(Debug, Clone)]
pub struct LlmQueryAnalyzer {
    backend: OllamaBackend,
    fallback: HeuristicQueryAnalyzer,
}

impl LlmQueryAnalyzer {
    pub fn new(backend: OllamaBackend) -> Self {
        Self {
            backend,
            fallback: HeuristicQueryAnalyzer::new(),
        }
    }
}

#[async_trait]
impl QueryAnalyzer for LlmQueryAnalyzer {
    async fn analyze(&self, query: &str) -> Result<QueryAnalysis, ProviderError> {
        if query.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("empty query".to_string()));
        }

        let reply = self
            .backend
            .prompt(ANALYSIS_PREAMBLE, query)
            .await
            .map_err(|message| match classify_failure(message) {
                CompletionError::Timeout => ProviderError::Timeout,
                CompletionError::Connection(m) => ProviderError::Connection(m),
                CompletionError::RateLimited => ProviderError::RateLimited,
                CompletionError::Unavailable(m) => ProviderError::Unavailable(m),
                CompletionError::Authentication(m) => ProviderError::Unauthorized(m),
                other => ProviderError::Other(other.to_string()),
            })?;

        match parse_analysis(&reply) {
            Ok(analysis) => {
                debug!(intent = ?analysis.intent, complexity = analysis.complexity_score, "Model analysis");
                Ok(analysis)
            }
            Err(e) => {
                warn!(error = %e, "Unusable analysis from model, using heuristics");
                self.fallback.analyze(query).await
            }
        }
    }
}

fn parse_analysis(reply: &str) -> Result<QueryAnalysis, AnalysisParseError> {
    let start = reply.find('{').ok_or(AnalysisParseError::NoJson)?;
    let end = reply.rfind('}').ok_or(AnalysisParseError::NoJson)?;
    if end < start {
        return Err(AnalysisParseError::NoJson);
    }
    let raw: QueryAnalysis = serde_json::from_str(&reply[start..=end])?;
    // Re-run the constructor so the score is clamped
    Ok(QueryAnalysis::new(
        raw.intent,
        raw.complexity_score,
        raw.requires_citations,
    ))
}
