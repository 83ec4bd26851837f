//! # Adaptive Research Agent
//!
//! Command-line front end for the `research-flow` workflow engine.
//!
//! A run analyzes the question, gathers citations from DuckDuckGo when the
//! question needs them, picks a reasoning method and has a local Ollama model
//! write the answer. The router loops back for more evidence when quality is
//! low; retry and iteration budgets bound every run.
//!
//! ## Quick Start
//! ```bash
//! cargo run -- "What are the latest developments in Rust async?"
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================

/// Configuration management
mod config;

/// Ollama-backed analyzer and reasoning provider
mod agent;

/// Citation sources
mod tools;

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::{Context, Result};
use clap::Parser;
use research_flow::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::agent::{LlmQueryAnalyzer, OllamaBackend, OllamaReasoningProvider};
use crate::config::Config;
use crate::tools::DuckDuckGoCitationSource;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "adaptive-research-agent",
    version,
    about = "Researches a question with web citations and a local LLM, adapting the plan to evidence quality",
    long_about = r#"
Adaptive Research Agent

Answers a question in routed steps:
  1. Analyze the question (intent, complexity, need for sources)
  2. Gather citations, looping back while evidence is thin
  3. Choose a reasoning method
  4. Write the answer, improving it once if quality is low

Press Ctrl-C to cancel a running session.

PREREQUISITES:
  1. Install Ollama: https://ollama.ai
  2. Pull a model: ollama pull llama3.2
  3. Start Ollama: ollama serve

EXAMPLES:
  adaptive-research-agent "Compare tokio and async-std for network services"
  adaptive-research-agent --parallel-sources --max-results 8 "State of WebAssembly in 2025"
  adaptive-research-agent --heuristic-analysis --json "What is a B-tree?"
"#
)]
struct Args {
    /// The research question
    #[arg(value_name = "QUERY")]
    query: String,

    /// Session id (generated when omitted)
    #[arg(long = "session-id")]
    session_id: Option<String>,

    /// Ollama model to use (overrides OLLAMA_MODEL)
    #[arg(short = 'm', long = "model", env = "OLLAMA_MODEL")]
    model: Option<String>,

    /// Citations requested per search round (overrides MAX_SEARCH_RESULTS)
    #[arg(short = 'n', long = "max-results")]
    max_results: Option<usize>,

    /// Classify the question with keyword heuristics instead of the model
    #[arg(long = "heuristic-analysis", default_value = "false")]
    heuristic_analysis: bool,

    /// Query a second, related citation strategy concurrently for complex questions
    #[arg(long = "parallel-sources", default_value = "false")]
    parallel_sources: bool,

    /// Extra instructions passed to the answer prompt
    #[arg(long = "instructions")]
    instructions: Option<String>,

    /// Print the full work item as JSON
    #[arg(long = "json", default_value = "false")]
    json: bool,

    /// Enable verbose/debug logging
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    verbose: bool,
}

impl Args {
    fn prompt_config(&self) -> Value {
        match &self.instructions {
            Some(text) => json!({ "instructions": text }),
            None => Value::Null,
        }
    }
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;
    if let Some(model) = &args.model {
        info!(model = %model, "Using model from command line");
        config.model = model.clone();
    }
    if let Some(max) = args.max_results {
        config.max_search_results = max;
    }
    config.validate()?;

    info!(
        model = %config.model,
        host = %config.ollama_host,
        max_iterations = config.max_total_iterations,
        "Configuration loaded"
    );

    let service = build_service(&config, &args)?;
    let session_id = args
        .session_id
        .clone()
        .unwrap_or_else(ResearchService::new_session_id);

    // Ctrl-C cancels the session; the run returns with a cancellation failure
    let canceller = service.clone();
    let watched = session_id.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(session_id = %watched, "Interrupted, cancelling research");
            canceller.cancel(&watched);
        }
    });

    let item = service
        .run(
            session_id,
            args.query.clone(),
            Value::Null,
            args.prompt_config(),
        )
        .await
        .context("could not start research session")?;

    report(&item, args.json)
}

fn build_service(config: &Config, args: &Args) -> Result<ResearchService> {
    let backend = OllamaBackend::new(config);
    let source = DuckDuckGoCitationSource::new(config.search_endpoint.clone())
        .context("failed to create the search client")?;

    let mut builder = ResearchWorkflowBuilder::new()
        .citation_source(Arc::new(source))
        .reasoning_provider(Arc::new(OllamaReasoningProvider::new(backend.clone())))
        .citation_limit(config.max_search_results)
        .parallel_citation_sources(args.parallel_sources)
        .orchestrator_config(config.orchestrator_config());

    if !args.heuristic_analysis {
        builder = builder.analyzer(Arc::new(LlmQueryAnalyzer::new(backend)));
    }

    builder
        .build_service()
        .context("failed to build the research workflow")
}

// =============================================================================
// OUTPUT
// =============================================================================
fn report(item: &WorkItem, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(item)?);
    }

    match item.outcome() {
        RunOutcome::Succeeded => {
            if !as_json {
                print_answer(item);
            }
            info!(
                iterations = item.iteration_count(),
                citations = item.citations.len(),
                "Research completed successfully"
            );
            Ok(())
        }
        RunOutcome::GaveUp => {
            warn!(
                iterations = item.iteration_count(),
                "Iteration budget ran out before an answer was written"
            );
            if !as_json {
                eprintln!("\nNo answer within the iteration budget. Sources found so far:");
                eprintln!("{}", item.format_citations());
            }
            anyhow::bail!("research gave up after {} iterations", item.iteration_count())
        }
        RunOutcome::Failed | RunOutcome::Running => {
            let failure = item
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "run did not finish".to_string());
            error!(error = %failure, "Research failed");
            eprintln!("\nResearch failed: {}", failure);
            if let Some(tip) = failure_tip(item.error.as_ref()) {
                eprintln!("\nTip: {}", tip);
            }
            anyhow::bail!(failure)
        }
    }
}

fn print_answer(item: &WorkItem) {
    let Some(response) = &item.final_response else {
        return;
    };
    println!("\n{}", "=".repeat(60));
    println!("RESEARCH RESULTS");
    println!("{}\n", "=".repeat(60));
    println!("{}", response.raw_text);
    if !item.citations.is_empty() {
        println!("\n{}", "-".repeat(60));
        println!("{}", item.format_citations());
    }
    println!("\n{}", "=".repeat(60));
}

fn failure_tip(failure: Option<&WorkflowFailure>) -> Option<&'static str> {
    let failure = failure?;
    let message = failure.message.to_lowercase();
    match failure.kind {
        FailureKind::Cancelled => None,
        FailureKind::WorkflowTimeout => Some("raise WORKFLOW_TIMEOUT_SECS or unset it"),
        _ if message.contains("connection") => Some("make sure Ollama is running: ollama serve"),
        _ if message.contains("model") => Some("make sure the model is installed: ollama pull llama3.2"),
        _ => None,
    }
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
