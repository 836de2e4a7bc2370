use super::context::PipelineContext;
use super::phase_trait::WorkflowPhase;
use super::phases::{
    enrich::EnrichPhase, extract::ExtractPhase, rank::RankPhase, search::SearchPhase,
    synthesize::SynthesizePhase,
};
use super::services::PipelineServices;
use crate::model::TherapyPlan;
use crate::progress::ProgressEvent;
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{debug, error, info};

pub struct PipelineOrchestrator {
    services: PipelineServices,
}

impl PipelineOrchestrator {
    pub fn new(services: PipelineServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &PipelineServices {
        &self.services
    }

    /// Runs every phase once, in order. A failure is recorded in
    /// `context.errors` and ends the run.
    pub async fn execute(&self, context: &mut PipelineContext) -> Result<TherapyPlan> {
        let start = Instant::now();
        info!(
            sources = context.sources.len(),
            pathogens = %context.input.pathogen_display(),
            "Starting pipeline orchestration"
        );

        match self.run_phases(context).await {
            Ok(plan) => {
                info!(
                    entries = plan.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Pipeline complete"
                );
                context.reporter.emit(ProgressEvent::Completed {
                    entries: plan.len(),
                    total_time: start.elapsed(),
                });
                Ok(plan)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(error = %message, "Pipeline failed");
                context.errors.push(message.clone());
                context.reporter.emit(ProgressEvent::Failed { error: message });
                Err(e)
            }
        }
    }

    async fn run_phases(&self, context: &mut PipelineContext) -> Result<TherapyPlan> {
        let workflow_phases: Vec<(Box<dyn WorkflowPhase>, &str)> = vec![
            (Box::new(SearchPhase), "SearchPhase"),
            (Box::new(ExtractPhase), "ExtractPhase"),
            (Box::new(RankPhase), "RankPhase"),
            (Box::new(SynthesizePhase), "SynthesizePhase"),
            (Box::new(EnrichPhase), "EnrichPhase"),
        ];

        for (phase, phase_name) in workflow_phases {
            info!("Phase: {}", phase_name);
            context.reporter.emit(ProgressEvent::PhaseStarted {
                phase: phase_name.to_string(),
            });

            let phase_start = Instant::now();
            phase
                .execute(&self.services, context)
                .await
                .with_context(|| format!("Phase {} failed", phase_name))?;

            context.reporter.emit(ProgressEvent::PhaseComplete {
                phase: phase_name.to_string(),
                duration: phase_start.elapsed(),
            });
            debug!("Phase {} complete", phase_name);
        }

        context
            .plan
            .clone()
            .context("Pipeline finished without a plan")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::ScriptedSessionFactory;
    use crate::llm::{MockLLMClient, StructuredGenerator};
    use crate::model::InputParameters;
    use crate::pipeline::PipelineConfig;
    use crate::progress::{ProgressHandler, StageReporter};
    use crate::search::StaticSearchClient;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ProgressHandler for Recorder {
        fn on_progress(&self, event: &ProgressEvent) {
            let label = match event {
                ProgressEvent::PhaseStarted { phase } => format!("start:{}", phase),
                ProgressEvent::Failed { .. } => "failed".to_string(),
                _ => return,
            };
            self.events.lock().unwrap().push(label);
        }
    }

    #[tokio::test]
    async fn test_run_without_sources_fails_and_records_error() {
        let services = PipelineServices::new(
            StructuredGenerator::new(Arc::new(MockLLMClient::new())),
            Arc::new(ScriptedSessionFactory::new()),
            PipelineConfig::default(),
        )
        .with_search(Arc::new(StaticSearchClient::default()));
        let recorder = Arc::new(Recorder::default());
        let mut context = PipelineContext::new(InputParameters::default())
            .with_reporter(StageReporter::new(recorder.clone()));

        let orchestrator = PipelineOrchestrator::new(services);
        let result = orchestrator.execute(&mut context).await;

        assert!(result.is_err());
        assert_eq!(context.errors.len(), 1);
        assert!(context.errors[0].contains("Phase SearchPhase failed"));
        assert!(context.errors[0].contains("No sources found"));
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["start:SearchPhase".to_string(), "failed".to_string()]
        );
    }
}
