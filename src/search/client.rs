use crate::llm::BackendError;
use crate::model::SourceDocument;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One search-engine result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

impl From<SearchHit> for SourceDocument {
    fn from(hit: SearchHit) -> Self {
        SourceDocument::new(hit.url, hit.title, hit.snippet)
    }
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Returns at most `max_results` hits; an empty list is a valid answer.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, BackendError>;

    fn name(&self) -> &str;
}

/// Serves a fixed result list. Used for cached searches and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSearchClient {
    hits: Vec<SearchHit>,
}

impl StaticSearchClient {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }
}

#[async_trait]
impl SearchClient for StaticSearchClient {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>, BackendError> {
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(n: usize) -> SearchHit {
        SearchHit {
            title: format!("Result {}", n),
            url: format!("https://example.org/{}", n),
            snippet: format!("snippet {}", n),
        }
    }

    #[tokio::test]
    async fn test_static_client_truncates() {
        let client = StaticSearchClient::new((1..=5).map(hit).collect());
        let hits = client.search("anything", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Result 1");
    }

    #[test]
    fn test_hit_into_source_document() {
        let doc: SourceDocument = hit(2).into();
        assert_eq!(doc.url, "https://example.org/2");
        assert_eq!(doc.title, "Result 2");
        assert_eq!(doc.raw_text, "snippet 2");
    }
}
