//! Cached search results on disk

use super::client::SearchHit;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCache {
    #[serde(default)]
    pub search_query: String,
    pub search_results: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<String>,
}

impl SearchCache {
    pub fn new(search_query: impl Into<String>, search_results: Vec<SearchHit>) -> Self {
        Self {
            search_query: search_query.into(),
            search_results,
            cached_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read search cache {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse search cache {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize search cache")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write search cache {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let cache = SearchCache::new(
            "query",
            vec![SearchHit {
                title: "t".into(),
                url: "u".into(),
                snippet: "s".into(),
            }],
        );

        cache.save(&path).unwrap();
        let loaded = SearchCache::load(&path).unwrap();

        assert_eq!(loaded, cache);
    }

    #[test]
    fn test_load_accepts_minimal_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"search_results":[{"title":"a","url":"b","snippet":"c"}]}"#).unwrap();

        let loaded = SearchCache::load(&path).unwrap();

        assert_eq!(loaded.search_results.len(), 1);
        assert!(loaded.search_query.is_empty());
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(SearchCache::load(Path::new("/definitely/not/here.json")).is_err());
    }
}
