//! # Tools Module
//!
//! Citation source backed by DuckDuckGo's HTML search page.
//!
//! DuckDuckGo has no free web search API, so results are scraped from the
//! HTML endpoint. Transport and HTTP failures are mapped onto
//! [`CitationError`] so the workflow engine can tell transient failures
//! (retried) from fatal ones.

use async_trait::async_trait;
use research_flow::providers::{CitationError, CitationSource};
use research_flow::research::state::extract_domain;
use research_flow::research::Citation;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Relevance of the top-ranked result; each following rank loses `RANK_DECAY`
const TOP_RELEVANCE: f32 = 0.95;
const RANK_DECAY: f32 = 0.08;
const MIN_RELEVANCE: f32 = 0.3;

// =============================================================================
// SCRAPED RESULT
// =============================================================================
/// A single result scraped from the results page.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchHit {
    fn into_citation(self, rank: usize) -> Citation {
        let relevance = (TOP_RELEVANCE - RANK_DECAY * rank as f32).max(MIN_RELEVANCE);
        Citation::new(self.title, self.url, relevance).with_content(self.snippet)
    }
}

// =============================================================================
// DUCKDUCKGO CITATION SOURCE
// =============================================================================
/// Citation source querying DuckDuckGo's HTML results page.
#[derive(Debug, Clone)]
pub struct DuckDuckGoCitationSource {
    client: reqwest::Client,
    endpoint: String,
    /// Pause before every request, to stay under DuckDuckGo's rate limits
    politeness_delay: Duration,
}

impl DuckDuckGoCitationSource {
    /// Create a source querying `endpoint` (e.g. `https://html.duckduckgo.com/html/`).
    pub fn new(endpoint: impl Into<String>) -> Result<Self, CitationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CitationError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            politeness_delay: Duration::from_millis(500),
        })
    }

    /// Override the delay inserted before each request.
    pub fn with_politeness_delay(mut self, delay: Duration) -> Self {
        self.politeness_delay = delay;
        self
    }

    async fn fetch(&self, query: &str) -> Result<String, CitationError> {
        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        debug!(url = %url, "Fetching search results");

        let response = self.client.get(&url).send().await.map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        response.text().await.map_err(classify_transport)
    }
}

#[async_trait]
impl CitationSource for DuckDuckGoCitationSource {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Citation>, CitationError> {
        info!(query = %query, limit, "Performing web search");

        if !self.politeness_delay.is_zero() {
            tokio::time::sleep(self.politeness_delay).await;
        }

        let body = self.fetch(query).await?;
        let hits = parse_results(&body, limit);

        if hits.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            info!(query = %query, count = hits.len(), "Search completed");
        }

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(rank, hit)| hit.into_citation(rank))
            .collect())
    }
}

fn classify_transport(e: reqwest::Error) -> CitationError {
    if e.is_timeout() {
        CitationError::Timeout
    } else if e.is_connect() {
        CitationError::Connection(e.to_string())
    } else if e.is_decode() {
        CitationError::Parse(e.to_string())
    } else if e.is_builder() {
        CitationError::Configuration(e.to_string())
    } else {
        CitationError::Unknown(e.to_string())
    }
}

fn classify_status(status: StatusCode, body: String) -> CitationError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => CitationError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CitationError::Unauthorized,
        s if s.is_server_error() => CitationError::ServerError(s.as_u16(), truncate(&body, 200)),
        s if s.is_client_error() => CitationError::BadRequest(format!("HTTP {}", s)),
        s => CitationError::Unknown(format!("unexpected HTTP {}", s)),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

// =============================================================================
// HTML PARSING
// =============================================================================
/// Parse DuckDuckGo result HTML into at most `limit` hits.
///
/// Result blocks (`result__a` links with their `result__snippet`) are
/// preferred; bare redirect links fill the remainder.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    let mut seen = HashSet::new();

    for block in html.split("class=\"result__a\"").skip(1) {
        if hits.len() >= limit {
            break;
        }
        let Some(url) = block_href(block).and_then(|href| resolve_href(&href)) else {
            continue;
        };
        if url.contains("duckduckgo.com") || !seen.insert(url.clone()) {
            continue;
        }
        let title = block
            .find('>')
            .and_then(|start| {
                let rest = &block[start + 1..];
                rest.find("</a>").map(|end| strip_tags(&rest[..end]))
            })
            .filter(|t| !t.is_empty())
            .or_else(|| extract_domain(&url))
            .unwrap_or_else(|| "Result".to_string());
        let snippet = block
            .split("result__snippet")
            .nth(1)
            .and_then(|s| {
                let start = s.find('>')? + 1;
                let end = s[start..].find("</")? + start;
                Some(strip_tags(&s[start..end]))
            })
            .unwrap_or_default();

        hits.push(SearchHit { title, url, snippet });
    }

    // Fallback: any redirect link carrying the target in `uddg=`
    for segment in html.split("uddg=").skip(1) {
        if hits.len() >= limit {
            break;
        }
        let Some(end) = segment.find(['&', '"', '\'']) else {
            continue;
        };
        let Ok(decoded) = urlencoding::decode(&segment[..end]) else {
            continue;
        };
        let url = decoded.into_owned();
        if url.starts_with("http") && !url.contains("duckduckgo.com") && seen.insert(url.clone()) {
            hits.push(SearchHit {
                title: extract_domain(&url).unwrap_or_else(|| "Result".to_string()),
                url,
                snippet: String::new(),
            });
        }
    }

    hits.truncate(limit);
    hits
}

fn block_href(block: &str) -> Option<String> {
    let start = block.find("href=\"")? + 6;
    let end = block[start..].find('"')? + start;
    Some(block[start..end].replace("&amp;", "&"))
}

/// Turn a result href into the target URL, unwrapping redirect links
fn resolve_href(href: &str) -> Option<String> {
    if let Some(pos) = href.find("uddg=") {
        let encoded = &href[pos + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        let decoded = urlencoding::decode(encoded).ok()?.into_owned();
        return decoded.starts_with("http").then_some(decoded);
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    href.starts_with("http").then(|| href.to_string())
}

fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for c in fragment.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
