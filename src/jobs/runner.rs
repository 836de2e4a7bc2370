//! Single-slot job runner
//!
//! At most one pipeline run is active per process. A second request while one
//! is running is rejected, not queued.

use super::store::{JobStatus, JobStore};
use super::JobError;
use crate::output::PipelineOutput;
use crate::pipeline::{PipelineContext, PipelineOrchestrator};
use crate::progress::{FanOutHandler, ProgressEvent, ProgressHandler, StageReporter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Holds the run slot; releasing happens on drop, including while unwinding.
#[derive(Debug)]
pub struct JobGuard {
    active: Arc<AtomicBool>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Result of one submitted run.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: String,
    pub status: JobStatus,
    pub output: PipelineOutput,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Mirrors stage progress into the job store.
pub struct JobStoreHandler {
    store: Arc<dyn JobStore>,
    job_id: String,
}

impl JobStoreHandler {
    pub fn new(store: Arc<dyn JobStore>, job_id: impl Into<String>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
        }
    }
}

impl ProgressHandler for JobStoreHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        if let ProgressEvent::Stage { stage, percent, .. } = event {
            if let Err(e) = self.store.update_progress(&self.job_id, stage.as_str(), *percent) {
                warn!(job_id = %self.job_id, error = %e, "Failed to record job progress");
            }
        }
    }
}

#[derive(Clone)]
pub struct JobRunner {
    active: Arc<AtomicBool>,
    store: Arc<dyn JobStore>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Claims the run slot or fails immediately with [`JobError::Busy`].
    pub fn try_start(&self) -> Result<JobGuard, JobError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| JobError::Busy)?;
        Ok(JobGuard {
            active: self.active.clone(),
        })
    }

    /// Runs the pipeline as a tracked job.
    ///
    /// A pipeline failure is not an `Err`: it is recorded on the job and
    /// returned as an outcome with `JobStatus::Error`. So is a result that
    /// could not be stored. `Err` means the job could not be run or tracked
    /// at all.
    pub async fn run(
        &self,
        orchestrator: &PipelineOrchestrator,
        context: &mut PipelineContext,
    ) -> Result<JobOutcome, JobError> {
        let _guard = self.try_start()?;
        let job_id = Uuid::new_v4().to_string();
        self.store.create(&job_id)?;
        info!(job_id = %job_id, "Job started");

        let caller = context.reporter.clone();
        let fan_out = FanOutHandler::new(vec![
            caller.handler().clone(),
            Arc::new(JobStoreHandler::new(self.store.clone(), job_id.clone())),
        ]);
        context.reporter = StageReporter::new(Arc::new(fan_out));
        context.reporter.emit(ProgressEvent::Started {
            job_id: job_id.clone(),
        });

        let result = orchestrator.execute(context).await;
        context.reporter = caller;

        let output = PipelineOutput::from_context(context);
        let status = match result {
            Ok(_) => match self.record_result(&job_id, &output) {
                Ok(()) => JobStatus::Completed,
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Job result not stored");
                    self.store
                        .fail(&job_id, &format!("Result could not be stored: {}", e))?;
                    JobStatus::Error
                }
            },
            Err(e) => {
                self.store.fail(&job_id, &format!("{:#}", e))?;
                JobStatus::Error
            }
        };
        info!(job_id = %job_id, status = ?status, "Job finished");

        Ok(JobOutcome {
            job_id,
            status,
            output,
        })
    }

    fn record_result(&self, job_id: &str, output: &PipelineOutput) -> Result<(), JobError> {
        self.store.complete(job_id, serde_json::to_value(output)?)
    }
}
