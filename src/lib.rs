//! abxplan - evidence synthesis for antibiotic therapy plans
//!
//! Given a patient context (pathogens, resistance genes, severity codes, age,
//! allergies, route constraint) and a set of clinical source documents, the
//! pipeline produces a plan with three tiers: first choice, second choice and
//! alternative antibiotics, each entry carrying dose, route, coverage, renal
//! adjustment and general considerations.
//!
//! # Pipeline
//!
//! 1. **Search**: find sources for the patient context, or use supplied ones
//! 2. **Extract**: one structured LLM call per source yields therapy candidates
//! 3. **Rank**: a second call per source re-categorises candidates and drops
//!    irrelevant ones; candidates the model omits are retried once
//! 4. **Synthesize**: candidates naming the same drug are unified and a tier
//!    is chosen by weighted vote
//! 5. **Enrich**: missing fields are filled from a drug reference site, then
//!    entries without dose, coverage or route are dropped
//!
//! # Example Usage
//!
//! ```ignore
//! use abxplan::{PipelineConfig, PipelineContext, PipelineOrchestrator, PipelineServices};
//! use abxplan::enrichment::HttpSessionFactory;
//! use abxplan::llm::StructuredGenerator;
//! use std::sync::Arc;
//!
//! let services = PipelineServices::new(
//!     StructuredGenerator::new(client),
//!     Arc::new(HttpSessionFactory::new(timeout)?),
//!     PipelineConfig::default(),
//! );
//! let mut context = PipelineContext::new(input).with_sources(sources);
//! let plan = PipelineOrchestrator::new(services).execute(&mut context).await?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod enrichment;
pub mod jobs;
pub mod llm;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod retry;
pub mod search;
pub mod synthesis;
pub mod util;

pub use config::{AbxplanConfig, ConfigError};
pub use enrichment::{EnrichmentConfig, EnrichmentEngine, EnrichmentReport};
pub use jobs::{InMemoryJobStore, JobError, JobRunner, JobStatus, JobStore};
pub use llm::{BackendError, LLMClient, StructuredGenerator};
pub use model::{Category, InputParameters, SourceDocument, TherapyCandidate, TherapyPlan, Tier, UnifiedEntry};
pub use output::PipelineOutput;
pub use pipeline::{PipelineConfig, PipelineContext, PipelineOrchestrator, PipelineServices};
pub use retry::{RetryError, RetryPolicy};
pub use util::{init_logging, LogFormat, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_abxplan() {
        assert_eq!(NAME, "abxplan");
    }
}
