use super::context::PipelineContext;
use super::services::PipelineServices;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait WorkflowPhase: Send + Sync {
    async fn execute(&self, services: &PipelineServices, context: &mut PipelineContext) -> Result<()>;
}
