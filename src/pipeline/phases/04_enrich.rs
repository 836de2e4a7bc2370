use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::pipeline::services::PipelineServices;
use crate::progress::Stage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

/// Fills missing fields, merges any duplicates that result, and drops
/// entries that still lack dose, coverage or route.
pub struct EnrichPhase;

#[async_trait]
impl WorkflowPhase for EnrichPhase {
    async fn execute(&self, services: &PipelineServices, context: &mut PipelineContext) -> Result<()> {
        let mut plan = context
            .plan
            .take()
            .context("Plan must be synthesized before enrichment")?;

        if services.config.enrich {
            let engine = services.enrichment_engine();
            let report = engine.enrich(&mut plan, &context.input, &context.reporter).await;
            context.enrichment = Some(report);
        } else {
            info!("Enrichment disabled");
        }

        services.synthesizer().regroup(&mut plan).await;

        let removed = plan.enforce_integrity();
        if !removed.is_empty() {
            warn!(removed = ?removed, "Removed entries missing dose, coverage or route");
        }

        context
            .reporter
            .report(Stage::Enrich, 100.0, format!("Final plan has {} entries", plan.len()));
        context.plan = Some(plan);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::ScriptedSessionFactory;
    use crate::llm::{MockLLMClient, StructuredGenerator};
    use crate::model::{Category, InputParameters, TherapyCandidate, TherapyPlan, Tier, UnifiedEntry};
    use crate::pipeline::PipelineConfig;
    use crate::retry::RetryPolicy;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_disabled_enrichment_still_enforces_integrity() {
        let services = PipelineServices::new(
            StructuredGenerator::new(Arc::new(MockLLMClient::new())),
            Arc::new(ScriptedSessionFactory::new()),
            PipelineConfig::default()
                .with_retry(RetryPolicy::immediate(1))
                .with_enrich(false),
        );
        let complete = TherapyCandidate::new("Linezolid", Category::FirstChoice, 1)
            .with_coverage("MRSA")
            .with_route("IV/PO")
            .with_dose("600 mg,IV/PO,q12h,10 days");
        let partial = TherapyCandidate::new("Daptomycin", Category::FirstChoice, 1).with_route("IV");

        let mut context = PipelineContext::new(InputParameters::default());
        context.plan = Some(TherapyPlan {
            first_choice: vec![
                UnifiedEntry::from_candidate(&complete, Tier::FirstChoice),
                UnifiedEntry::from_candidate(&partial, Tier::FirstChoice),
            ],
            ..Default::default()
        });

        EnrichPhase.execute(&services, &mut context).await.unwrap();

        let plan = context.plan.unwrap();
        assert_eq!(plan.first_choice.len(), 1);
        assert_eq!(plan.first_choice[0].medical_name, "Linezolid");
        assert!(context.enrichment.is_none());
    }

    #[tokio::test]
    async fn test_missing_plan_is_an_error() {
        let services = PipelineServices::new(
            StructuredGenerator::new(Arc::new(MockLLMClient::new())),
            Arc::new(ScriptedSessionFactory::new()),
            PipelineConfig::default(),
        );
        let mut context = PipelineContext::new(InputParameters::default());
        assert!(EnrichPhase.execute(&services, &mut context).await.is_err());
    }
}
