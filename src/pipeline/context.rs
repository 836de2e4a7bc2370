//! Per-run state threaded through every phase

use super::rank_memory::RankMemory;
use crate::enrichment::EnrichmentReport;
use crate::model::{
    InputParameters, ResistanceGeneObservation, SourceDocument, SourceSummary, TherapyCandidate,
    TherapyPlan,
};
use crate::progress::StageReporter;

/// What one source yielded before ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceExtraction {
    /// 1-based position of the source in the run
    pub source_index: usize,
    pub candidates: Vec<TherapyCandidate>,
    pub genes: Vec<ResistanceGeneObservation>,
}

/// Created at run start, discarded (or persisted by a job store) at run end.
pub struct PipelineContext {
    /// Patient and sample parameters for this run
    pub input: InputParameters,

    /// Evidence sources, in their stable run order
    pub sources: Vec<SourceDocument>,

    /// Query used when sources had to be searched for
    pub search_query: Option<String>,

    /// Per-source extraction results, in source order
    pub extractions: Vec<SourceExtraction>,

    /// Ranked candidates from all sources
    pub candidates: Vec<TherapyCandidate>,

    /// Gene observations from all sources
    pub genes: Vec<ResistanceGeneObservation>,

    pub plan: Option<TherapyPlan>,

    pub enrichment: Option<EnrichmentReport>,

    /// Run-level errors
    pub errors: Vec<String>,

    /// Advisory ranking memo; may be carried over from earlier runs
    pub rank_memory: RankMemory,

    pub reporter: StageReporter,
}

impl PipelineContext {
    pub fn new(input: InputParameters) -> Self {
        Self {
            input,
            sources: Vec::new(),
            search_query: None,
            extractions: Vec::new(),
            candidates: Vec::new(),
            genes: Vec::new(),
            plan: None,
            enrichment: None,
            errors: Vec::new(),
            rank_memory: RankMemory::default(),
            reporter: StageReporter::silent(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<SourceDocument>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_rank_memory(mut self, memory: RankMemory) -> Self {
        self.rank_memory = memory;
        self
    }

    pub fn with_reporter(mut self, reporter: StageReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Index/url/title of every source, for resolving `mentioned_in_sources`.
    pub fn source_summaries(&self) -> Vec<SourceSummary> {
        self.sources
            .iter()
            .enumerate()
            .map(|(i, source)| SourceSummary {
                index: i + 1,
                url: source.url.clone(),
                title: source.title.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let context = PipelineContext::new(InputParameters::default());
        assert!(context.sources.is_empty());
        assert!(context.plan.is_none());
        assert!(context.errors.is_empty());
        assert!(context.rank_memory.is_empty());
    }

    #[test]
    fn test_source_summaries_are_one_based() {
        let context = PipelineContext::new(InputParameters::default()).with_sources(vec![
            SourceDocument::new("https://a.example", "A", "text"),
            SourceDocument::new("https://b.example", "B", "text"),
        ]);

        let summaries = context.source_summaries();
        assert_eq!(summaries[0].index, 1);
        assert_eq!(summaries[1].url, "https://b.example");
    }
}
