//! Long-lived collaborators shared by every phase

use super::config::PipelineConfig;
use crate::enrichment::{EnrichmentEngine, SessionFactory};
use crate::llm::StructuredGenerator;
use crate::search::SearchClient;
use crate::synthesis::{Synthesizer, Unifier};
use std::sync::Arc;

/// Capabilities a run consumes. Cloning is cheap.
#[derive(Clone)]
pub struct PipelineServices {
    /// Structured generation for extraction, ranking, unification and enrichment
    pub generator: StructuredGenerator,

    /// Evidence search; only needed when sources are not supplied
    pub search: Option<Arc<dyn SearchClient>>,

    /// Browser-style sessions for reference scraping
    pub sessions: Arc<dyn SessionFactory>,

    pub config: PipelineConfig,
}

impl PipelineServices {
    pub fn new(
        generator: StructuredGenerator,
        sessions: Arc<dyn SessionFactory>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            generator,
            search: None,
            sessions,
            config,
        }
    }

    pub fn with_search(mut self, search: Arc<dyn SearchClient>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn synthesizer(&self) -> Synthesizer {
        Synthesizer::new(Unifier::new(self.generator.clone(), self.config.retry))
            .with_limits(self.config.first_choice_limit, self.config.second_choice_limit)
    }

    pub fn enrichment_engine(&self) -> EnrichmentEngine {
        EnrichmentEngine::new(
            self.generator.clone(),
            self.sessions.clone(),
            self.config.enrichment_config(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::ScriptedSessionFactory;
    use crate::llm::MockLLMClient;
    use crate::search::StaticSearchClient;

    #[test]
    fn test_services_creation() {
        let services = PipelineServices::new(
            StructuredGenerator::new(Arc::new(MockLLMClient::new())),
            Arc::new(ScriptedSessionFactory::new()),
            PipelineConfig::default(),
        );
        assert!(services.search.is_none());
        assert_eq!(services.generator.client_name(), "mock");

        let services = services.with_search(Arc::new(StaticSearchClient::default()));
        assert_eq!(services.search.as_ref().map(|s| s.name()), Some("static"));
        assert_eq!(services.enrichment_engine().config().alternative_target, 5);
    }
}
