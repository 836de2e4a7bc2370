//! Transport error taxonomy shared by the LLM, search and session backends

use crate::retry::Backoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure talking to a model, search or reference-site backend.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum BackendError {
    #[error("API error{}: {message}", status_suffix(.status_code))]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Authentication failed: {message}")]
    AuthenticationError { message: String },

    #[error("Request timed out after {seconds} seconds")]
    TimeoutError { seconds: u64 },

    #[error("Rate limit exceeded{}", retry_suffix(.retry_after))]
    RateLimitError { retry_after: Option<u64> },

    /// The backend answered, but not with something usable.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    /// Missing keys or settings; retrying cannot help.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    /// The answer did not fit the declared output shape.
    #[error("Parse error: {message} (context: {context})")]
    ParseError { message: String, context: String },

    #[error("{message}")]
    Other { message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({})", code)).unwrap_or_default()
}

fn retry_suffix(retry_after: &Option<u64>) -> String {
    retry_after
        .map(|seconds| format!(", retry after {} seconds", seconds))
        .unwrap_or_default()
}

impl BackendError {
    /// Errors a retry cannot fix.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            BackendError::AuthenticationError { .. } | BackendError::ConfigurationError { .. }
        )
    }

    /// Retry handling: permanent errors stop, a rate limit waits as told.
    pub fn backoff(&self) -> Backoff {
        match self {
            e if e.is_permanent() => Backoff::GiveUp,
            BackendError::RateLimitError {
                retry_after: Some(seconds),
            } => Backoff::After(Duration::from_secs(*seconds)),
            _ => Backoff::Scheduled,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::TimeoutError { seconds: 0 }
        } else if let Some(status) = e.status() {
            BackendError::ApiError {
                message: e.to_string(),
                status_code: Some(status.as_u16()),
            }
        } else {
            BackendError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            BackendError::RateLimitError { retry_after: Some(20) }.to_string(),
            "Rate limit exceeded, retry after 20 seconds"
        );
        assert_eq!(
            BackendError::ApiError {
                message: "boom".to_string(),
                status_code: None
            }
            .to_string(),
            "API error: boom"
        );
        let err = BackendError::ApiError {
            message: "bad gateway".to_string(),
            status_code: Some(502),
        };
        assert_eq!(err.to_string(), "API error (502): bad gateway");
        assert_eq!(
            BackendError::TimeoutError { seconds: 30 }.to_string(),
            "Request timed out after 30 seconds"
        );
    }

    #[test]
    fn test_permanent_errors() {
        assert!(BackendError::AuthenticationError {
            message: "no key".into()
        }
        .is_permanent());
        assert!(!BackendError::NetworkError {
            message: "reset".into()
        }
        .is_permanent());
    }

    #[test]
    fn test_backoff_classification() {
        let auth = BackendError::AuthenticationError {
            message: "no key".into(),
        };
        assert_eq!(auth.backoff(), Backoff::GiveUp);
        assert_eq!(
            BackendError::RateLimitError { retry_after: Some(20) }.backoff(),
            Backoff::After(Duration::from_secs(20))
        );
        assert_eq!(
            BackendError::RateLimitError { retry_after: None }.backoff(),
            Backoff::Scheduled
        );
        assert_eq!(BackendError::TimeoutError { seconds: 5 }.backoff(), Backoff::Scheduled);
    }
}
