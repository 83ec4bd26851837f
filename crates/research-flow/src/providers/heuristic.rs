//! Keyword based query analysis
//!
//! No I/O. Used when no LLM analyzer is configured and in tests.

use async_trait::async_trait;

use super::{ProviderError, QueryAnalyzer};
use crate::research::state::{Intent, QueryAnalysis};

const GREETINGS: &[&str] = &["hi", "hello", "hey", "thanks", "thank you", "good morning"];
const COMPARISON_MARKERS: &[&str] = &[
    "compare",
    "versus",
    " vs ",
    " vs.",
    "difference between",
    "better than",
];
const EXPLANATION_MARKERS: &[&str] = &["explain", "how does", "how do", "why ", "what causes"];
const RESEARCH_MARKERS: &[&str] = &[
    "research",
    "latest",
    "recent",
    "developments",
    "state of",
    "survey",
    "overview",
    "trends",
    "analyze",
    "analysis",
];
const FACTUAL_MARKERS: &[&str] = &["what is", "who ", "when ", "where ", "how many", "how much"];

/// Rule-based analyzer
#[derive(Debug, Clone, Default)]
pub struct HeuristicQueryAnalyzer;

impl HeuristicQueryAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze synchronously
    pub fn classify(&self, query: &str) -> QueryAnalysis {
        let lowered = format!(" {} ", query.trim().to_lowercase());
        let intent = detect_intent(&lowered);
        let complexity = complexity_score(query, &lowered, intent);
        QueryAnalysis::new(intent, complexity, intent != Intent::Conversational)
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn detect_intent(lowered: &str) -> Intent {
    let trimmed = lowered.trim().trim_end_matches(['!', '.', '?']);
    let greeting = GREETINGS
        .iter()
        .any(|g| trimmed == *g || trimmed.starts_with(&format!("{} ", g)));
    if greeting && trimmed.split_whitespace().count() <= 4 {
        return Intent::Conversational;
    }
    if contains_any(lowered, COMPARISON_MARKERS) {
        Intent::Comparison
    } else if contains_any(lowered, RESEARCH_MARKERS) {
        Intent::Research
    } else if contains_any(lowered, EXPLANATION_MARKERS) {
        Intent::Explanation
    } else if contains_any(lowered, FACTUAL_MARKERS) {
        Intent::Factual
    } else {
        Intent::Unknown
    }
}

fn complexity_score(query: &str, lowered: &str, intent: Intent) -> f32 {
    let words = query.split_whitespace().count() as f32;
    let mut score = (words / 4.0).min(4.0);

    score += match intent {
        Intent::Comparison => 4.0,
        Intent::Research => 2.5,
        Intent::Explanation => 1.5,
        Intent::Factual => 0.5,
        Intent::Conversational => 0.0,
        Intent::Unknown => 1.0,
    };

    // Multi-part questions
    score += lowered.matches(" and ").count() as f32 * 0.5;
    score += query.matches('?').count().saturating_sub(1) as f32;

    if query.chars().count() > 100 {
        score += 2.0;
    }
    score
}

#[async_trait]
impl QueryAnalyzer for HeuristicQueryAnalyzer {
    async fn analyze(&self, query: &str) -> Result<QueryAnalysis, ProviderError> {
        if query.trim().is_empty() {
            return Err(ProviderError::InvalidResponse("empty query".to_string()));
        }
        Ok(self.classify(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_is_conversational() {
        let analysis = HeuristicQueryAnalyzer::new().classify("Hello!");
        assert_eq!(analysis.intent, Intent::Conversational);
        assert!(!analysis.requires_citations);
        assert!(analysis.complexity_score < 1.0);
    }

    #[test]
    fn test_comparison_is_complex() {
        let analysis =
            HeuristicQueryAnalyzer::new().classify("Compare tokio and async-std for building web servers");
        assert_eq!(analysis.intent, Intent::Comparison);
        assert!(analysis.requires_citations);
        assert!(analysis.complexity_score >= 6.0);
    }

    #[test]
    fn test_research_intent() {
        let analysis = HeuristicQueryAnalyzer::new().classify("What are the latest developments in Rust async?");
        assert_eq!(analysis.intent, Intent::Research);
    }

    #[test]
    fn test_factual_is_simple() {
        let analysis = HeuristicQueryAnalyzer::new().classify("What is the capital of France?");
        assert_eq!(analysis.intent, Intent::Factual);
        assert!(analysis.complexity_score < 6.0);
    }

    #[test]
    fn test_score_is_clamped() {
        let long = "compare and contrast ".repeat(40);
        let analysis = HeuristicQueryAnalyzer::new().classify(&long);
        assert!(analysis.complexity_score <= 10.0);
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let result = HeuristicQueryAnalyzer::new().analyze("   ").await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn test_analyze_matches_classify() {
        let analyzer = HeuristicQueryAnalyzer::new();
        let query = "Compare tokio and async-std for building web servers";
        let analysis = tokio_test::block_on(analyzer.analyze(query)).unwrap();
        assert_eq!(analysis, analyzer.classify(query));
    }
}
