//! Chat backend over the `genai` crate
//!
//! One client type covers every provider `genai` knows; the provider is picked
//! by [`parse_provider`] from configuration.

use super::client::LLMClient;
use super::error::BackendError;
use super::types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
use async_trait::async_trait;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage as WireMessage, ChatOptions, ChatRequest, ChatResponseFormat};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Parses a provider name as accepted by `ABXPLAN_PROVIDER` and `--provider`.
pub fn parse_provider(name: &str) -> Option<AdapterKind> {
    match name.trim().to_lowercase().as_str() {
        "claude" => Some(AdapterKind::Anthropic),
        "grok" => AdapterKind::from_lower_str("xai"),
        other => AdapterKind::from_lower_str(other),
    }
}

/// Routes every request to `url`, keeping the provider's own key variable.
fn pinned_endpoint(provider: AdapterKind, model: String, url: String) -> ServiceTargetResolver {
    ServiceTargetResolver::from_resolver_fn(
        move |_: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let auth = provider
                .default_key_env_name()
                .map(AuthData::from_env)
                .unwrap_or_else(|| AuthData::from_single(""));
            Ok(ServiceTarget {
                endpoint: Endpoint::from_owned(url.clone()),
                auth,
                model: ModelIden::new(provider, &model),
            })
        },
    )
}

fn wire_message(message: &ChatMessage) -> WireMessage {
    let text = message.content.as_str();
    match message.role {
        MessageRole::System => WireMessage::system(text),
        MessageRole::User => WireMessage::user(text),
        MessageRole::Assistant => WireMessage::assistant(text),
    }
}

/// Structured requests ask the provider for JSON mode; the shape itself is
/// enforced by the caller's parser.
fn chat_options(request: &LLMRequest) -> ChatOptions {
    let mut options = ChatOptions::default();
    if let Some(temperature) = request.temperature {
        options = options.with_temperature(f64::from(temperature));
    }
    if let Some(max_tokens) = request.max_tokens {
        options = options.with_max_tokens(max_tokens);
    }
    if request.response_schema.is_some() {
        options = options.with_response_format(ChatResponseFormat::JsonMode);
    }
    options
}

/// Maps a provider failure onto the shared taxonomy so retries can tell
/// credential problems from transient ones.
fn classify_failure(provider: AdapterKind, detail: &str) -> BackendError {
    let lowered = detail.to_lowercase();
    if lowered.contains("401") || lowered.contains("unauthorized") || lowered.contains("api key") {
        BackendError::AuthenticationError {
            message: format!("{} rejected the credentials: {}", provider.as_str(), detail),
        }
    } else if lowered.contains("429") || lowered.contains("rate limit") {
        BackendError::RateLimitError { retry_after: None }
    } else {
        BackendError::ApiError {
            message: format!("{} request failed: {}", provider.as_str(), detail),
            status_code: None,
        }
    }
}

pub struct GenAIClient {
    client: Client,
    model: String,
    provider: AdapterKind,
    timeout: Duration,
}

impl GenAIClient {
    /// Creates a client for `provider`/`model`, optionally pinned to a custom endpoint.
    pub fn new(
        provider: AdapterKind,
        model: String,
        timeout: Duration,
        custom_endpoint: Option<String>,
    ) -> Result<Self, BackendError> {
        if model.trim().is_empty() {
            return Err(BackendError::ConfigurationError {
                message: "model name must not be empty".to_string(),
            });
        }

        let client = match custom_endpoint {
            Some(url) => {
                debug!(provider = provider.as_str(), %url, "Pinning model endpoint");
                Client::builder()
                    .with_service_target_resolver(pinned_endpoint(provider, model.clone(), url))
                    .build()
            }
            None => Client::default(),
        };
        debug!(provider = provider.as_str(), %model, ?timeout, "Model client ready");

        Ok(Self {
            client,
            model,
            provider,
            timeout,
        })
    }
}

#[async_trait]
impl LLMClient for GenAIClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let started = Instant::now();
        let options = chat_options(&request);
        let wire = ChatRequest::new(request.messages.iter().map(wire_message).collect());

        let call = self.client.exec_chat(&self.model, wire, Some(&options));
        let response = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                warn!(provider = self.provider.as_str(), "Model call exceeded {:?}", self.timeout);
                BackendError::TimeoutError {
                    seconds: self.timeout.as_secs(),
                }
            })?
            .map_err(|e| {
                warn!(provider = self.provider.as_str(), "Model call failed: {}", e);
                classify_failure(self.provider, &e.to_string())
            })?;

        let content = response.first_text().unwrap_or_default().to_string();
        Ok(LLMResponse::text(content, started.elapsed()))
    }

    fn name(&self) -> &str {
        self.provider.as_str()
    }

    fn model_info(&self) -> Option<String> {
        Some(self.model.clone())
    }
}

impl std::fmt::Debug for GenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAIClient")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}
