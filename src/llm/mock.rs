use super::client::LLMClient;
use super::error::BackendError;
use super::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Reply(String),
    Fail(BackendError),
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        MockResponse::Reply(content.into())
    }

    pub fn json(value: serde_json::Value) -> Self {
        MockResponse::Reply(value.to_string())
    }

    pub fn error(error: BackendError) -> Self {
        MockResponse::Fail(error)
    }
}

#[derive(Default)]
struct Script {
    rules: Vec<(String, MockResponse)>,
    queue: VecDeque<MockResponse>,
    seen: Vec<LLMRequest>,
}

impl Script {
    fn answer(&mut self, text: &str) -> Option<MockResponse> {
        self.rules
            .iter()
            .find(|(marker, _)| text.contains(marker.as_str()))
            .map(|(_, response)| response.clone())
            .or_else(|| self.queue.pop_front())
    }
}

/// Scripted client for tests.
///
/// A request is answered by the first rule whose marker occurs anywhere in
/// its messages, else by the next queued response. Rules keep concurrent
/// stages independent of call order. Every request is recorded.
#[derive(Default)]
pub struct MockLLMClient {
    script: Mutex<Script>,
}

impl MockLLMClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_response(&self, response: MockResponse) {
        self.script().queue.push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        self.script().queue.extend(responses);
    }

    /// Answers every request containing `marker` with `response`.
    pub fn when(&self, marker: impl Into<String>, response: MockResponse) {
        self.script().rules.push((marker.into(), response));
    }

    pub fn requests(&self) -> Vec<LLMRequest> {
        self.script().seen.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script().seen.len()
    }

    /// Number of recorded requests whose text contains `marker`.
    pub fn calls_containing(&self, marker: &str) -> usize {
        self.script()
            .seen
            .iter()
            .filter(|r| all_text(r).contains(marker))
            .count()
    }
}

fn all_text(request: &LLMRequest) -> String {
    let parts: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
    parts.join("\n")
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let text = all_text(&request);
        let answer = {
            let mut script = self.script();
            script.seen.push(request);
            script.answer(&text)
        };

        match answer {
            Some(MockResponse::Reply(content)) => {
                Ok(LLMResponse::text(content, Duration::from_millis(1)))
            }
            Some(MockResponse::Fail(error)) => Err(error),
            None => Err(BackendError::Other {
                message: "mock client has no scripted answer for this request".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model_info(&self) -> Option<String> {
        Some("scripted".to_string())
    }
}

impl std::fmt::Debug for MockLLMClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let script = self.script();
        f.debug_struct("MockLLMClient")
            .field("rules", &script.rules.len())
            .field("queued", &script.queue.len())
            .field("seen", &script.seen.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    fn ask(text: &str) -> LLMRequest {
        LLMRequest::new(vec![ChatMessage::system("pharmacist"), ChatMessage::user(text)])
    }

    #[tokio::test]
    async fn test_queue_is_fifo_then_empty() {
        let client = MockLLMClient::new();
        client.add_responses([MockResponse::text("one"), MockResponse::text("two")]);

        assert_eq!(client.chat(ask("a")).await.unwrap().content, "one");
        assert_eq!(client.chat(ask("b")).await.unwrap().content, "two");
        assert!(matches!(client.chat(ask("c")).await, Err(BackendError::Other { .. })));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let client = MockLLMClient::new();
        client.add_response(MockResponse::error(BackendError::TimeoutError { seconds: 30 }));

        let result = client.chat(ask("hi")).await;
        assert!(matches!(result, Err(BackendError::TimeoutError { seconds: 30 })));
    }

    #[tokio::test]
    async fn test_rules_win_over_queue_and_persist() {
        let client = MockLLMClient::new();
        client.add_response(MockResponse::text("queued"));
        client.when("Vancomycin", MockResponse::json(serde_json::json!({"ok": true})));

        assert_eq!(client.chat(ask("about Vancomycin")).await.unwrap().content, r#"{"ok":true}"#);
        assert_eq!(client.chat(ask("Vancomycin again")).await.unwrap().content, r#"{"ok":true}"#);
        assert_eq!(client.chat(ask("other")).await.unwrap().content, "queued");
        assert_eq!(client.calls_containing("Vancomycin"), 2);
        assert_eq!(client.calls_containing("pharmacist"), 3);
    }

    #[tokio::test]
    async fn test_first_matching_rule_applies() {
        let client = MockLLMClient::new();
        client.when("re-rank", MockResponse::text("narrow"));
        client.when("rank", MockResponse::text("broad"));

        assert_eq!(client.chat(ask("please re-rank")).await.unwrap().content, "narrow");
        assert_eq!(client.chat(ask("please rank")).await.unwrap().content, "broad");
        assert_eq!(client.requests().len(), 2);
    }
}
