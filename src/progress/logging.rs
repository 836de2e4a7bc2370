//! Progress as log lines, for non-interactive runs

use super::{ProgressEvent, ProgressHandler, Stage};
use std::sync::Mutex;
use tracing::{debug, error, info};

/// Logs phase boundaries at info and per-item stage updates at debug.
///
/// The first update of each stage is promoted to info so a plain log still
/// shows where a long run is.
#[derive(Debug, Default)]
pub struct LoggingHandler {
    current: Mutex<Option<Stage>>,
}

impl LoggingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn enters(&self, stage: Stage) -> bool {
        let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        current.replace(stage) != Some(stage)
    }
}

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { job_id } => info!(job = %job_id, "Therapy plan job started"),
            ProgressEvent::PhaseStarted { phase } => debug!(%phase, "Phase started"),
            ProgressEvent::Stage {
                stage,
                percent,
                message,
            } => {
                let percent = percent.round() as u32;
                if self.enters(*stage) {
                    info!(stage = stage.as_str(), percent, "{}", message);
                } else {
                    debug!(stage = stage.as_str(), percent, "{}", message);
                }
            }
            ProgressEvent::PhaseComplete { phase, duration } => {
                info!(%phase, elapsed_ms = duration.as_millis() as u64, "Phase finished");
            }
            ProgressEvent::Completed {
                entries,
                total_time,
            } => info!(
                entries,
                elapsed_ms = total_time.as_millis() as u64,
                "Therapy plan ready"
            ),
            ProgressEvent::Failed { error } => error!(%error, "Therapy plan job failed"),
        }
    }
}
