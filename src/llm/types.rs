//! Provider-independent prompt and answer types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Who a message is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One turn of a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// A single model call: the prompt plus sampling options
#[derive(Debug, Clone, Serialize)]
pub struct LLMRequest {
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature; extraction runs at 0.0
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// JSON schema the response must satisfy, if the provider can enforce one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

impl LLMRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
            response_schema: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Concatenated user-message text, used for logging and test assertions.
    pub fn user_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Raw model output and how long it took
#[derive(Debug, Clone, Serialize)]
pub struct LLMResponse {
    pub content: String,
    #[serde(with = "duration_millis")]
    pub response_time: Duration,
}

impl LLMResponse {
    pub fn text(content: impl Into<String>, response_time: Duration) -> Self {
        Self {
            content: content.into(),
            response_time,
        }
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_serialize_lowercase() {
        let message = ChatMessage::system("You are a clinical pharmacist");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "system");

        let back: ChatMessage =
            serde_json::from_value(serde_json::json!({"role": "assistant", "content": "ok"})).unwrap();
        assert_eq!(back, ChatMessage::new(MessageRole::Assistant, "ok"));
    }

    #[test]
    fn test_llm_request_builder() {
        let request = LLMRequest::new(vec![
            ChatMessage::system("sys"),
            ChatMessage::user("first"),
            ChatMessage::user("second"),
        ])
        .with_temperature(0.0)
        .with_max_tokens(1024)
        .with_response_schema(serde_json::json!({"type": "object"}));

        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.max_tokens, Some(1024));
        assert!(request.response_schema.is_some());
        assert_eq!(request.user_text(), "first\nsecond");
    }

    #[test]
    fn test_response_serializes_latency_in_millis() {
        let response = LLMResponse::text("{}", Duration::from_millis(1500));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["response_time"], 1500);
    }
}
