//! Schema-constrained generation
//!
//! [`StructuredGenerator::generate`] asks the model for a value of type `T`,
//! declaring the expected shape with the `schemars` schema of `T`. The
//! contract is: `Ok(Some(T))` on a parseable answer, `Ok(None)` when the model
//! answers with nothing or JSON `null`, `Err` on transport or parse failure.

use super::client::LLMClient;
use super::error::BackendError;
use super::types::{ChatMessage, LLMRequest};
use crate::audit::ExchangeLogger;
use crate::retry::{RetryError, RetryPolicy};
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a clinical pharmacology assistant. You answer strictly with JSON \
that validates against the JSON Schema you are given. Never invent values that are not supported \
by the provided text; use null when a value is not stated.";

/// Body of the first fenced block (```json or bare ```), else the trimmed text.
pub(crate) fn unfence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some((_, after)) = trimmed.split_once("```") else {
        return trimmed;
    };
    let after = after.strip_prefix("json").unwrap_or(after);
    match after.split_once("```") {
        Some((body, _)) => body.trim(),
        None => trimmed,
    }
}

/// Falls back to the outermost `{...}` span when the model wraps JSON in prose.
fn outermost_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

#[derive(Clone)]
pub struct StructuredGenerator {
    client: Arc<dyn LLMClient>,
    logger: ExchangeLogger,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl StructuredGenerator {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self {
            client,
            logger: ExchangeLogger::disabled(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_logger(mut self, logger: ExchangeLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    fn schema_text<T: JsonSchema>() -> Result<String, BackendError> {
        serde_json::to_string(&schema_for!(T)).map_err(|e| BackendError::Other {
            message: format!("failed to render output schema: {}", e),
        })
    }

    pub async fn generate<T>(&self, operation: &str, prompt: &str) -> Result<Option<T>, BackendError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = Self::schema_text::<T>()?;
        let full_prompt = format!(
            "{}\n\nRespond with one JSON value that validates against this JSON Schema:\n{}",
            prompt, schema
        );

        let mut request = LLMRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(full_prompt),
        ])
        .with_temperature(self.temperature)
        .with_response_schema(serde_json::Value::String(schema));
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let start = Instant::now();
        let outcome = self.client.chat(request.clone()).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        self.logger
            .record(operation, self.client.name(), &request, outcome.as_ref(), latency_ms);
        let response = outcome?;

        debug!(operation, latency_ms, "Structured generation returned");
        parse_structured(operation, &response.content)
    }

    /// [`generate`](Self::generate) under a retry policy; empty answers count as
    /// retryable, permanent errors do not.
    pub async fn generate_with_retry<T>(
        &self,
        operation: &str,
        prompt: &str,
        policy: &RetryPolicy,
    ) -> Result<Option<T>, RetryError<BackendError>>
    where
        T: DeserializeOwned + JsonSchema,
    {
        policy
            .run_with(operation, BackendError::backoff, |_| {
                self.generate::<T>(operation, prompt)
            })
            .await
    }
}

/// Parses a model answer according to the generation contract.
pub fn parse_structured<T: DeserializeOwned>(
    operation: &str,
    content: &str,
) -> Result<Option<T>, BackendError> {
    let body = unfence(content);
    if body.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(first) => match outermost_object(body)
            .map(|span| serde_json::from_str::<serde_json::Value>(span))
        {
            Some(Ok(v)) => v,
            _ => {
                return Err(BackendError::ParseError {
                    message: first.to_string(),
                    context: operation.to_string(),
                })
            }
        },
    };

    if value.is_null() {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| BackendError::ParseError {
            message: e.to_string(),
            context: operation.to_string(),
        })
}

impl std::fmt::Debug for StructuredGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredGenerator")
            .field("client", &self.client.name())
            .field("temperature", &self.temperature)
            .finish()
    }
}
