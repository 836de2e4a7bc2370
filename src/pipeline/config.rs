use crate::enrichment::{
    ChunkConfig, EnrichmentConfig, ReferenceSite, DEFAULT_ALTERNATIVE_TARGET,
    DEFAULT_CONSIDERATIONS_CAP, DEFAULT_ENRICH_WORKERS, DEFAULT_REFERENCE_DOMAIN,
    DEFAULT_SEARCH_ENGINE_URL,
};
use crate::retry::RetryPolicy;
use crate::synthesis::{DEFAULT_FIRST_CHOICE_LIMIT, DEFAULT_SECOND_CHOICE_LIMIT};

pub const DEFAULT_EXTRACT_WORKERS: usize = 2;
pub const DEFAULT_SEARCH_MAX_RESULTS: usize = 10;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub extract_workers: usize,
    pub enrich_workers: usize,
    pub alternative_target: usize,
    pub first_choice_limit: usize,
    pub second_choice_limit: usize,
    pub chunk_tokens: usize,
    pub chunk_overlap_tokens: usize,
    pub considerations_cap: usize,
    pub reference_domain: String,
    pub search_engine_url: String,
    pub search_max_results: usize,
    pub retry: RetryPolicy,
    /// Run the enrichment engine; integrity checks and regrouping run regardless.
    pub enrich: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let chunk = ChunkConfig::default();
        Self {
            extract_workers: DEFAULT_EXTRACT_WORKERS,
            enrich_workers: DEFAULT_ENRICH_WORKERS,
            alternative_target: DEFAULT_ALTERNATIVE_TARGET,
            first_choice_limit: DEFAULT_FIRST_CHOICE_LIMIT,
            second_choice_limit: DEFAULT_SECOND_CHOICE_LIMIT,
            chunk_tokens: chunk.max_tokens,
            chunk_overlap_tokens: chunk.overlap_tokens,
            considerations_cap: DEFAULT_CONSIDERATIONS_CAP,
            reference_domain: DEFAULT_REFERENCE_DOMAIN.to_string(),
            search_engine_url: DEFAULT_SEARCH_ENGINE_URL.to_string(),
            search_max_results: DEFAULT_SEARCH_MAX_RESULTS,
            retry: RetryPolicy::default(),
            enrich: true,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extract_workers(mut self, workers: usize) -> Self {
        self.extract_workers = workers;
        self
    }

    pub fn with_enrich_workers(mut self, workers: usize) -> Self {
        self.enrich_workers = workers;
        self
    }

    pub fn with_alternative_target(mut self, target: usize) -> Self {
        self.alternative_target = target;
        self
    }

    pub fn with_tier_limits(mut self, first_choice: usize, second_choice: usize) -> Self {
        self.first_choice_limit = first_choice;
        self.second_choice_limit = second_choice;
        self
    }

    pub fn with_chunking(mut self, tokens: usize, overlap_tokens: usize) -> Self {
        self.chunk_tokens = tokens;
        self.chunk_overlap_tokens = overlap_tokens;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_enrich(mut self, enrich: bool) -> Self {
        self.enrich = enrich;
        self
    }

    pub fn enrichment_config(&self) -> EnrichmentConfig {
        EnrichmentConfig {
            workers: self.enrich_workers,
            alternative_target: self.alternative_target,
            chunk: ChunkConfig::new(self.chunk_tokens, self.chunk_overlap_tokens),
            considerations_cap: self.considerations_cap,
            reference: ReferenceSite {
                domain: self.reference_domain.clone(),
                search_engine_url: self.search_engine_url.clone(),
                ..ReferenceSite::default()
            },
            retry: self.retry,
        }
    }
}
