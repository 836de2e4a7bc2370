//! LLM client abstraction layer
//!
//! A trait-based abstraction over LLM communication so the GenAI backend and
//! the scripted mock can be used interchangeably, plus the typed
//! structured-generation capability the pipeline consumes.

mod client;
mod error;
mod genai;
mod mock;
mod structured;
mod types;

pub use client::LLMClient;
pub use error::BackendError;
pub use genai::{parse_provider, GenAIClient};
pub use mock::{MockLLMClient, MockResponse};
pub use structured::{parse_structured, StructuredGenerator};
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
