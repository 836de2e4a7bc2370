use super::error::BackendError;
use super::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;

#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError>;

    fn name(&self) -> &str;

    fn model_info(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct EchoClient;

    #[async_trait]
    impl LLMClient for EchoClient {
        async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
            Ok(LLMResponse::text(request.user_text(), Duration::from_millis(1)))
        }

        fn name(&self) -> &str {
            "EchoClient"
        }
    }

    #[tokio::test]
    async fn test_client_trait() {
        let client = EchoClient;
        assert_eq!(client.name(), "EchoClient");
        assert!(client.model_info().is_none());

        let request = LLMRequest::new(vec![super::super::ChatMessage::user("ping")]);
        let response = client.chat(request).await.unwrap();
        assert_eq!(response.content, "ping");
    }
}
