//! Sonar API client
//!
//! Real-time web search with citations, used to enrich content drafts with
//! verified statistics, local market data, and competitive intelligence.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::env::EnvConfig;
use crate::limiter::RateLimiter;

/// Base URL for the Sonar API
const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

/// Model used when neither the caller nor the configuration names one
pub const DEFAULT_MODEL: &str = "sonar";

/// Default admission budget, matching the provider's published quota
const DEFAULT_REQUESTS_PER_MINUTE: usize = 50;

/// Errors raised when constructing a client from configuration
///
/// These are fatal: a client is never handed out half-configured. Callers
/// that can degrade gracefully treat a `ConfigError` as "research features
/// unavailable" and carry on without the client.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No API key was provided
    #[error("PERPLEXITY_API_KEY is not set; research queries are unavailable")]
    MissingApiKey,

    /// The configured rate-limit budget is not a positive integer
    #[error("invalid requests-per-minute value: '{0}'")]
    InvalidRateLimit(String),
}

/// Recency window applied to web search results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyFilter {
    Day,
    Week,
    Month,
    Year,
}

impl RecencyFilter {
    /// Wire value expected by the API
    pub fn as_str(&self) -> &'static str {
        match self {
            RecencyFilter::Day => "day",
            RecencyFilter::Week => "week",
            RecencyFilter::Month => "month",
            RecencyFilter::Year => "year",
        }
    }

    /// Parses a recency name, case-insensitively
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "day" => Some(RecencyFilter::Day),
            "week" => Some(RecencyFilter::Week),
            "month" => Some(RecencyFilter::Month),
            "year" => Some(RecencyFilter::Year),
            _ => None,
        }
    }
}

/// Generation parameters for a single query
///
/// Temperature is passed through to the provider unvalidated; an
/// out-of-range value is the provider's to reject.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Model override; falls back to the client's configured default
    pub model: Option<String>,
    /// Sampling temperature (provider range 0.0–2.0)
    pub temperature: f64,
    /// How recent web results must be
    pub recency: RecencyFilter,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.2,
            recency: RecencyFilter::Month,
        }
    }
}

/// Provider-reported token consumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Normalized result envelope for every query
///
/// Exactly one of the success and failure shapes holds: either `success` is
/// true and `content` is populated, or `success` is false and `error` carries
/// a descriptive message with `content` empty. Constructed only through
/// [`QueryResult::completed`] and [`QueryResult::failed`] to keep that
/// invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Generated answer text
    pub content: Option<String>,
    /// Source URLs backing the answer, possibly empty
    pub citations: Vec<String>,
    /// Token usage, when the provider reported it
    pub usage: Option<Usage>,
    /// Whether the remote call produced an answer
    pub success: bool,
    /// Failure description, present iff `success` is false
    pub error: Option<String>,
}

impl QueryResult {
    pub(crate) fn completed(content: String, citations: Vec<String>, usage: Option<Usage>) -> Self {
        Self {
            content: Some(content),
            citations,
            usage,
            success: true,
            error: None,
        }
    }

    pub(crate) fn failed(error: impl Into<String>) -> Self {
        Self {
            content: None,
            citations: Vec::new(),
            usage: None,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Internal error used while performing a request, before it is converted
/// into a failure envelope
#[derive(Debug, Error)]
enum QueryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: StatusCode, body: String },

    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("response contained no choices")]
    EmptyResponse,
}

/// Rate-limited client for the Sonar search-completion API
#[derive(Debug)]
pub struct SonarClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
    limiter: RateLimiter,
}

impl SonarClient {
    /// Creates a client with the default model and rate budget
    ///
    /// Fails immediately on an empty key rather than deferring to first use.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            limiter: RateLimiter::new(DEFAULT_REQUESTS_PER_MINUTE, Duration::from_secs(60)),
        })
    }

    /// Builds a client from a validated environment configuration
    ///
    /// Reads `PERPLEXITY_API_KEY`, `SONAR_MODEL`, and
    /// `SONAR_REQUESTS_PER_MINUTE`. Call this once at startup and pass the
    /// client down; a `ConfigError` means research features are unavailable.
    pub fn from_config(config: &EnvConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .get("PERPLEXITY_API_KEY")
            .ok_or(ConfigError::MissingApiKey)?;
        let mut client = Self::new(api_key)?;

        if let Some(model) = config.get("SONAR_MODEL") {
            client.default_model = model.to_string();
        }

        if let Some(raw) = config.get("SONAR_REQUESTS_PER_MINUTE") {
            let budget: usize = raw
                .parse()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| ConfigError::InvalidRateLimit(raw.to_string()))?;
            client.limiter = RateLimiter::new(budget, Duration::from_secs(60));
        }

        Ok(client)
    }

    /// Overrides the API base URL (used by tests against a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the rate-limit budget
    pub fn with_rate_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.limiter = RateLimiter::new(max_requests, window);
        self
    }

    /// Sends a prompt to the completion endpoint
    ///
    /// The call queues behind the rate limiter. Remote failures of any kind
    /// (non-2xx status, network error, malformed body) are converted into a
    /// failure envelope rather than returned as `Err`, so callers looping
    /// over many items can continue past individual failures.
    pub async fn query(&self, prompt: &str, options: &QueryOptions) -> QueryResult {
        self.limiter
            .execute(|| async {
                match self.send(prompt, options).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(error = %e, "query failed");
                        QueryResult::failed(e.to_string())
                    }
                }
            })
            .await
    }

    async fn send(&self, prompt: &str, options: &QueryOptions) -> Result<QueryResult, QueryError> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": options.temperature,
            "return_citations": true,
            "return_images": false,
            "search_recency_filter": options.recency.as_str(),
        });

        debug!(model, recency = options.recency.as_str(), "sending query");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Api { status, body });
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&response.text().await?)?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(QueryError::EmptyResponse)?;

        Ok(QueryResult::completed(
            content,
            completion.citations,
            completion.usage,
        ))
    }

    /// Finds a verified statistic, with sources, backing a claim
    ///
    /// Low temperature and a one-year recency window: factual lookups want
    /// determinism over variety.
    pub async fn enrich_statistic(&self, claim: &str, topic: &str, category: &str) -> QueryResult {
        let prompt = format!(
            r#"Find verified, authoritative statistics for: "{claim}"

**Context**:
- Topic: {topic}
- Category: {category}
- Location: Sydney, Australia (prefer Australian/Sydney data if available)
- Recency: Prefer recent data

**Requirements**:
1. Provide exact statistic with source
2. Include source name, publication year, and URL
3. Prefer: Industry reports, research studies, government data, or authoritative publications
4. If multiple sources exist, choose most reputable
5. If no exact match, provide closest relevant statistic

**Return ONLY in this format** (no extra text):
Statistic: [exact number/percentage with brief context]
Source: [Publication Name, Year]
URL: [source URL]

If no verified data found, return:
NOT_FOUND: Brief explanation why"#
        );

        self.query(
            &prompt,
            &QueryOptions {
                temperature: 0.1,
                recency: RecencyFilter::Year,
                ..Default::default()
            },
        )
        .await
    }

    /// Researches Sydney-specific market data for a topic
    pub async fn sydney_data(&self, topic: &str, category: &str) -> QueryResult {
        let prompt = format!(
            r#"Find recent Sydney, Australia specific data and insights for: {topic}

**Category**: {category}

**Required Information**:
1. Sydney market size or statistics
2. Sydney-specific trends or insights
3. Australian industry benchmarks (if Sydney data unavailable)
4. Local case studies or examples

**Requirements**:
- Focus on Sydney, NSW, Australia
- Prefer recent data
- Include sources and URLs
- Provide actionable insights for Sydney businesses

Return in structured format with citations."#
        );

        self.query(
            &prompt,
            &QueryOptions {
                temperature: 0.2,
                recency: RecencyFilter::Month,
                ..Default::default()
            },
        )
        .await
    }

    /// Verifies a claim against authoritative sources
    pub async fn verify_fact(&self, claim: &str, topic: &str) -> QueryResult {
        let prompt = format!(
            r#"Verify this claim and provide authoritative sources:

"{claim}"

**Context**: {topic}

**Task**:
1. Is this claim accurate? (TRUE/FALSE/PARTIALLY TRUE/CANNOT VERIFY)
2. What are the most authoritative sources supporting or refuting this?
3. What is the correct information if claim is false?
4. Provide source URLs

Return format:
Verdict: [TRUE/FALSE/PARTIALLY TRUE/CANNOT VERIFY]
Explanation: [Brief explanation]
Sources: [List of authoritative sources with URLs]
Correct Version: [If claim is false, provide correct version]"#
        );

        self.query(
            &prompt,
            &QueryOptions {
                temperature: 0.1,
                recency: RecencyFilter::Year,
                ..Default::default()
            },
        )
        .await
    }

    /// Lists trending topics in a category for a location
    ///
    /// Higher temperature than the factual methods: trend discovery benefits
    /// from variety.
    pub async fn trending_topics(&self, category: &str, location: &str) -> QueryResult {
        let prompt = format!(
            r#"Find the top 10 trending topics in {category} for {location} right now.

**Requirements**:
1. Topics relevant to local businesses
2. Recent trends (last 3 months)
3. Provide brief explanation why each topic is trending
4. Include search volume indicators if available
5. Provide sources

Return as numbered list with:
- Topic title
- Why it's trending
- Relevance score (1-10)
- Source URL"#
        );

        self.query(
            &prompt,
            &QueryOptions {
                temperature: 0.3,
                recency: RecencyFilter::Month,
                ..Default::default()
            },
        )
        .await
    }

    /// Analyzes a competitor's recent activity
    pub async fn competitive_intel(&self, competitor: &str, focus: &str) -> QueryResult {
        let prompt = format!(
            r#"Analyze {competitor}'s {focus}:

**Analysis Required**:
1. Recent content topics (last 3 months)
2. Content performance indicators
3. Strategy strengths and weaknesses
4. Opportunities for differentiation

Provide actionable insights with sources."#
        );

        self.query(
            &prompt,
            &QueryOptions {
                temperature: 0.2,
                recency: RecencyFilter::Month,
                ..Default::default()
            },
        )
        .await
    }
}

/// Completion endpoint response structure
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Vec<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}
