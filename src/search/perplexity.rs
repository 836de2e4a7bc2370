//! Perplexity search API client

use super::client::{SearchClient, SearchHit};
use crate::llm::BackendError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const PERPLEXITY_SEARCH_URL: &str = "https://api.perplexity.ai/search";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
    max_tokens: u32,
    max_tokens_per_page: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl From<RawResult> for SearchHit {
    fn from(raw: RawResult) -> Self {
        SearchHit {
            title: raw.title.unwrap_or_else(|| "No Title".to_string()),
            url: raw.url.unwrap_or_default(),
            snippet: raw.snippet.or(raw.text).or(raw.content).unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct PerplexityClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    max_tokens: u32,
    max_tokens_per_page: u32,
}

impl PerplexityClient {
    pub fn new(
        api_key: String,
        max_tokens: u32,
        max_tokens_per_page: u32,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        if api_key.trim().is_empty() {
            return Err(BackendError::ConfigurationError {
                message: "PERPLEXITY_API_KEY is empty".to_string(),
            });
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("abxplan/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key,
            endpoint: PERPLEXITY_SEARCH_URL.to_string(),
            max_tokens,
            max_tokens_per_page,
        })
    }

    /// Points the client at another endpoint (a local stub in tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchClient for PerplexityClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, BackendError> {
        let body = SearchRequest {
            query,
            max_results,
            max_tokens: self.max_tokens,
            max_tokens_per_page: self.max_tokens_per_page,
        };

        debug!(max_results, "Calling Perplexity search");
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Perplexity search failed");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    BackendError::AuthenticationError { message: text }
                }
                StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimitError { retry_after },
                _ => BackendError::ApiError {
                    message: text,
                    status_code: Some(status.as_u16()),
                },
            });
        }

        let parsed: SearchResponse = resp.json().await.map_err(|e| BackendError::InvalidResponse {
            message: e.to_string(),
            raw_response: None,
        })?;

        Ok(parsed
            .results
            .into_iter()
            .map(SearchHit::from)
            .take(max_results)
            .collect())
    }

    fn name(&self) -> &str {
        "perplexity"
    }
}

impl std::fmt::Debug for PerplexityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerplexityClient")
            .field("endpoint", &self.endpoint)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
