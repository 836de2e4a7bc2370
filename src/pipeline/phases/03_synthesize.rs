use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::services::PipelineServices;
use crate::progress::Stage;
use anyhow::Result;
use async_trait::async_trait;

/// Groups ranked candidates across sources into the tiered plan.
pub struct SynthesizePhase;

#[async_trait]
impl WorkflowPhase for SynthesizePhase {
    async fn execute(&self, services: &PipelineServices, context: &mut PipelineContext) -> Result<()> {
        context.reporter.report(
            Stage::Synthesize,
            0.0,
            format!("Unifying {} candidates", context.candidates.len()),
        );

        let synthesizer = services.synthesizer();
        let candidates = std::mem::take(&mut context.candidates);
        let genes = std::mem::take(&mut context.genes);
        let mut plan = synthesizer.build_plan(candidates, genes).await;
        plan.sources = context.source_summaries();

        context.reporter.report(
            Stage::Synthesize,
            100.0,
            format!("Plan has {} entries", plan.len()),
        );
        context.plan = Some(plan);
        Ok(())
    }
}
