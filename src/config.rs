//! Configuration management for abxplan
//!
//! Settings load from environment variables with defaults via
//! `AbxplanConfig::default()`; call [`AbxplanConfig::validate`] before use.
//!
//! # Environment Variables
//!
//! ## LLM
//! - `ABXPLAN_PROVIDER`: ollama|openai|claude|gemini|groq - default: "ollama"
//! - `ABXPLAN_MODEL`: model name - default: "gpt-oss:20b"
//! - `ABXPLAN_API_BASE_URL`: custom endpoint for the provider
//! - `ABXPLAN_TEMPERATURE`: default: "0.0"
//! - `ABXPLAN_REQUEST_TIMEOUT`: seconds - default: "120"
//!
//! Provider credentials are read by genai itself (`OPENAI_API_KEY`,
//! `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`, `GROQ_API_KEY`, `OLLAMA_HOST`).
//!
//! ## Retry
//! - `ABXPLAN_MAX_ATTEMPTS` - default: "5"
//! - `ABXPLAN_RETRY_BASE_DELAY_MS` - default: "2000"
//! - `ABXPLAN_RETRY_MAX_DELAY_MS` - default: "30000"
//!
//! ## Pipeline
//! - `ABXPLAN_EXTRACT_WORKERS` - default: "2"
//! - `ABXPLAN_ENRICH_WORKERS` - default: "3"
//! - `ABXPLAN_ALTERNATIVE_TARGET` - default: "5"
//! - `ABXPLAN_FIRST_CHOICE_LIMIT` - default: "5"
//! - `ABXPLAN_SECOND_CHOICE_LIMIT` - default: "4"
//! - `ABXPLAN_CHUNK_TOKENS` - default: "1500"
//! - `ABXPLAN_CHUNK_OVERLAP_TOKENS` - default: "125"
//! - `ABXPLAN_CONSIDERATIONS_CAP` - characters, default: "300"
//! - `ABXPLAN_REFERENCE_DOMAIN` - default: "drugs.com"
//! - `ABXPLAN_SEARCH_ENGINE_URL` - default: "https://html.duckduckgo.com/html/"
//!
//! ## Search
//! - `PERPLEXITY_API_KEY` - required only when sources are not supplied
//! - `PERPLEXITY_MAX_RESULTS` - default: "10"
//! - `PERPLEXITY_MAX_TOKENS` - default: "50000"
//! - `PERPLEXITY_MAX_TOKENS_PER_PAGE` - default: "4096"

use crate::llm::{parse_provider, GenAIClient, LLMClient};
use crate::pipeline::PipelineConfig;
use crate::retry::RetryPolicy;
use crate::search::PerplexityClient;
use genai::adapter::AdapterKind;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PROVIDER: &str = "ollama";
const DEFAULT_MODEL: &str = "gpt-oss:20b";
const DEFAULT_TEMPERATURE: f32 = 0.0;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 2000;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
const DEFAULT_EXTRACT_WORKERS: usize = 2;
const DEFAULT_ENRICH_WORKERS: usize = 3;
const DEFAULT_ALTERNATIVE_TARGET: usize = 5;
const DEFAULT_FIRST_CHOICE_LIMIT: usize = 5;
const DEFAULT_SECOND_CHOICE_LIMIT: usize = 4;
const DEFAULT_CHUNK_TOKENS: usize = 1500;
const DEFAULT_CHUNK_OVERLAP_TOKENS: usize = 125;
const DEFAULT_CONSIDERATIONS_CAP: usize = 300;
const DEFAULT_REFERENCE_DOMAIN: &str = "drugs.com";
const DEFAULT_SEARCH_ENGINE_URL: &str = "https://html.duckduckgo.com/html/";
const DEFAULT_SEARCH_MAX_RESULTS: usize = 10;
const DEFAULT_SEARCH_MAX_TOKENS: u32 = 50_000;
const DEFAULT_SEARCH_MAX_TOKENS_PER_PAGE: u32 = 4096;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: ollama, openai, claude, gemini, groq")]
    InvalidProvider(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Backend initialization failed: {0}")]
    BackendInitError(#[from] crate::llm::BackendError),
}

#[derive(Debug, Clone)]
pub struct AbxplanConfig {
    pub provider: String,
    pub model: String,
    pub api_base_url: Option<String>,
    pub temperature: f32,
    pub request_timeout_secs: u64,

    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,

    pub extract_workers: usize,
    pub enrich_workers: usize,
    pub alternative_target: usize,
    pub first_choice_limit: usize,
    pub second_choice_limit: usize,
    pub chunk_tokens: usize,
    pub chunk_overlap_tokens: usize,
    pub considerations_cap: usize,
    pub reference_domain: String,
    pub search_engine_url: String,

    pub perplexity_api_key: Option<String>,
    pub search_max_results: usize,
    pub search_max_tokens: u32,
    pub search_max_tokens_per_page: u32,

    /// JSONL audit log of LLM exchanges
    pub exchange_log: Option<PathBuf>,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Default for AbxplanConfig {
    fn default() -> Self {
        Self {
            provider: env_string("ABXPLAN_PROVIDER")
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
                .to_lowercase(),
            model: env_string("ABXPLAN_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base_url: env_string("ABXPLAN_API_BASE_URL"),
            temperature: env_or("ABXPLAN_TEMPERATURE", DEFAULT_TEMPERATURE),
            request_timeout_secs: env_or("ABXPLAN_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT_SECS),

            max_attempts: env_or("ABXPLAN_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            retry_base_delay_ms: env_or("ABXPLAN_RETRY_BASE_DELAY_MS", DEFAULT_RETRY_BASE_DELAY_MS),
            retry_max_delay_ms: env_or("ABXPLAN_RETRY_MAX_DELAY_MS", DEFAULT_RETRY_MAX_DELAY_MS),

            extract_workers: env_or("ABXPLAN_EXTRACT_WORKERS", DEFAULT_EXTRACT_WORKERS),
            enrich_workers: env_or("ABXPLAN_ENRICH_WORKERS", DEFAULT_ENRICH_WORKERS),
            alternative_target: env_or("ABXPLAN_ALTERNATIVE_TARGET", DEFAULT_ALTERNATIVE_TARGET),
            first_choice_limit: env_or("ABXPLAN_FIRST_CHOICE_LIMIT", DEFAULT_FIRST_CHOICE_LIMIT),
            second_choice_limit: env_or("ABXPLAN_SECOND_CHOICE_LIMIT", DEFAULT_SECOND_CHOICE_LIMIT),
            chunk_tokens: env_or("ABXPLAN_CHUNK_TOKENS", DEFAULT_CHUNK_TOKENS),
            chunk_overlap_tokens: env_or("ABXPLAN_CHUNK_OVERLAP_TOKENS", DEFAULT_CHUNK_OVERLAP_TOKENS),
            considerations_cap: env_or("ABXPLAN_CONSIDERATIONS_CAP", DEFAULT_CONSIDERATIONS_CAP),
            reference_domain: env_string("ABXPLAN_REFERENCE_DOMAIN")
                .unwrap_or_else(|| DEFAULT_REFERENCE_DOMAIN.to_string()),
            search_engine_url: env_string("ABXPLAN_SEARCH_ENGINE_URL")
                .unwrap_or_else(|| DEFAULT_SEARCH_ENGINE_URL.to_string()),

            perplexity_api_key: env_string("PERPLEXITY_API_KEY"),
            search_max_results: env_or("PERPLEXITY_MAX_RESULTS", DEFAULT_SEARCH_MAX_RESULTS),
            search_max_tokens: env_or("PERPLEXITY_MAX_TOKENS", DEFAULT_SEARCH_MAX_TOKENS),
            search_max_tokens_per_page: env_or(
                "PERPLEXITY_MAX_TOKENS_PER_PAGE",
                DEFAULT_SEARCH_MAX_TOKENS_PER_PAGE,
            ),

            exchange_log: env_string("ABXPLAN_EXCHANGE_LOG").map(PathBuf::from),
        }
    }
}

impl AbxplanConfig {
    pub fn adapter_kind(&self) -> Result<AdapterKind, ConfigError> {
        parse_provider(&self.provider).ok_or_else(|| ConfigError::InvalidProvider(self.provider.clone()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.adapter_kind()?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("Model name must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(format!(
                "Temperature must be within 0.0-2.0, got {}",
                self.temperature
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "Retry attempt budget must be at least 1".to_string(),
            ));
        }
        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(ConfigError::ValidationFailed(
                "Retry base delay cannot exceed the max delay".to_string(),
            ));
        }
        if self.extract_workers == 0 || self.enrich_workers == 0 {
            return Err(ConfigError::ValidationFailed(
                "Worker counts must be at least 1".to_string(),
            ));
        }
        if self.chunk_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "Chunk size must be at least 1 token".to_string(),
            ));
        }
        if self.chunk_overlap_tokens >= self.chunk_tokens {
            return Err(ConfigError::ValidationFailed(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap_tokens, self.chunk_tokens
            )));
        }
        if self.search_max_results == 0 {
            return Err(ConfigError::ValidationFailed(
                "Search result limit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_base_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            extract_workers: self.extract_workers,
            enrich_workers: self.enrich_workers,
            alternative_target: self.alternative_target,
            first_choice_limit: self.first_choice_limit,
            second_choice_limit: self.second_choice_limit,
            chunk_tokens: self.chunk_tokens,
            chunk_overlap_tokens: self.chunk_overlap_tokens,
            considerations_cap: self.considerations_cap,
            reference_domain: self.reference_domain.clone(),
            search_engine_url: self.search_engine_url.clone(),
            search_max_results: self.search_max_results,
            retry: self.retry_policy(),
            ..PipelineConfig::default()
        }
    }

    pub fn create_llm_client(&self) -> Result<Arc<dyn LLMClient>, ConfigError> {
        let client = GenAIClient::new(
            self.adapter_kind()?,
            self.model.clone(),
            Duration::from_secs(self.request_timeout_secs),
            self.api_base_url.clone(),
        )?;
        Ok(Arc::new(client))
    }

    pub fn create_search_client(&self) -> Result<PerplexityClient, ConfigError> {
        let api_key = self
            .perplexity_api_key
            .clone()
            .ok_or_else(|| ConfigError::Missing("PERPLEXITY_API_KEY".to_string()))?;
        let client = PerplexityClient::new(
            api_key,
            self.search_max_tokens,
            self.search_max_tokens_per_page,
            Duration::from_secs(self.request_timeout_secs),
        )?;
        Ok(client)
    }
}

impl fmt::Display for AbxplanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "abxplan configuration:")?;
        writeln!(f, "  Provider: {}", self.provider)?;
        writeln!(f, "  Model: {}", self.model)?;
        if let Some(ref url) = self.api_base_url {
            writeln!(f, "  Endpoint: {}", url)?;
        }
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(
            f,
            "  Retry: {} attempts, {}-{} ms backoff",
            self.max_attempts, self.retry_base_delay_ms, self.retry_max_delay_ms
        )?;
        writeln!(
            f,
            "  Workers: extract={}, enrich={}",
            self.extract_workers, self.enrich_workers
        )?;
        writeln!(f, "  Alternative Target: {}", self.alternative_target)?;
        writeln!(f, "  Reference Domain: {}", self.reference_domain)?;
        writeln!(
            f,
            "  Search API Key: {}",
            if self.perplexity_api_key.is_some() { "set" } else { "unset" }
        )?;
        Ok(())
    }
}
