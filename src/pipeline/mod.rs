pub mod config;
pub mod context;
pub mod orchestrator;
pub mod phase_trait;
pub mod phases;
pub mod rank_memory;
pub mod services;

pub use config::PipelineConfig;
pub use context::{PipelineContext, SourceExtraction};
pub use orchestrator::PipelineOrchestrator;
pub use phase_trait::WorkflowPhase;
pub use rank_memory::RankMemory;
pub use services::PipelineServices;
