//! Evidence quality assessment
//!
//! A pure function over the citations gathered so far. The router recomputes
//! it on every decision; nothing ever mutates an assessment in place.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::state::Citation;

/// Weight of the average relevance in the overall score
pub const RELEVANCE_WEIGHT: f64 = 0.5;
/// Weight of the source diversity in the overall score
pub const DIVERSITY_WEIGHT: f64 = 0.3;
/// Weight of the content richness in the overall score
pub const RICHNESS_WEIGHT: f64 = 0.2;
/// Total content characters at which richness saturates
pub const RICHNESS_SATURATION_CHARS: f64 = 10_000.0;

/// Aggregate quality signal for a citation set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Mean relevance score, 0.0 to 1.0
    pub avg_relevance: f64,
    /// Distinct domains divided by citation count
    pub source_diversity: f64,
    /// Total content characters relative to the saturation point, capped at 1.0
    pub content_richness: f64,
    /// Weighted combination of the three components
    pub overall: f64,
    pub citation_count: usize,
    /// Label of the step this assessment was taken after
    pub context: String,
}

impl QualityAssessment {
    /// Assessment of an empty evidence set
    pub fn empty(context: impl Into<String>) -> Self {
        Self {
            avg_relevance: 0.0,
            source_diversity: 0.0,
            content_richness: 0.0,
            overall: 0.0,
            citation_count: 0,
            context: context.into(),
        }
    }

    /// True when relevance is the weakest of the three weighted components
    pub fn relevance_is_bottleneck(&self, relevance_threshold: f64) -> bool {
        self.avg_relevance < relevance_threshold
            || (self.avg_relevance <= self.source_diversity
                && self.avg_relevance <= self.content_richness)
    }
}

/// Stateless assessor; exists so callers can hold it behind a field
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityAssessor;

impl QualityAssessor {
    pub fn new() -> Self {
        Self
    }

    /// Assess the given citations
    pub fn assess(&self, citations: &[Citation], context: &str) -> QualityAssessment {
        assess(citations, context)
    }
}

/// Compute the quality of a citation set.
///
/// Deterministic: the same citation sequence always yields a bit-identical
/// result, since sums are taken in sequence order.
pub fn assess(citations: &[Citation], context: &str) -> QualityAssessment {
    if citations.is_empty() {
        return QualityAssessment::empty(context);
    }

    let count = citations.len() as f64;
    let avg_relevance = citations
        .iter()
        .map(|c| f64::from(c.relevance_score))
        .sum::<f64>()
        / count;

    let domains: HashSet<String> = citations.iter().map(Citation::domain_key).collect();
    let source_diversity = domains.len() as f64 / count;

    let total_chars: usize = citations.iter().map(|c| c.content.chars().count()).sum();
    let content_richness = (total_chars as f64 / RICHNESS_SATURATION_CHARS).min(1.0);

    let overall = RELEVANCE_WEIGHT * avg_relevance
        + DIVERSITY_WEIGHT * source_diversity
        + RICHNESS_WEIGHT * content_richness;

    QualityAssessment {
        avg_relevance,
        source_diversity,
        content_richness,
        overall,
        citation_count: citations.len(),
        context: context.to_string(),
    }
}
