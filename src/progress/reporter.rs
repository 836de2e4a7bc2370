//! Stage-scoped progress reporting

use super::{NoOpHandler, ProgressEvent, ProgressHandler, Stage};
use std::sync::Arc;

/// Cheap, cloneable sink that stages call with stage-local percentages.
#[derive(Clone)]
pub struct StageReporter {
    handler: Arc<dyn ProgressHandler>,
}

impl StageReporter {
    pub fn new(handler: Arc<dyn ProgressHandler>) -> Self {
        Self { handler }
    }

    pub fn silent() -> Self {
        Self::new(Arc::new(NoOpHandler))
    }

    pub fn handler(&self) -> &Arc<dyn ProgressHandler> {
        &self.handler
    }

    /// Reports `local_percent` (0-100 within `stage`) on the overall scale.
    pub fn report(&self, stage: Stage, local_percent: f32, message: impl Into<String>) {
        self.handler.on_progress(&ProgressEvent::Stage {
            stage,
            percent: stage.overall_percent(local_percent),
            message: message.into(),
        });
    }

    /// Reports `done` of `total` items within `stage`.
    pub fn report_fraction(&self, stage: Stage, done: usize, total: usize, message: impl Into<String>) {
        let local = if total == 0 {
            100.0
        } else {
            done as f32 * 100.0 / total as f32
        };
        self.report(stage, local, message);
    }

    pub fn emit(&self, event: ProgressEvent) {
        self.handler.on_progress(&event);
    }
}

impl std::fmt::Debug for StageReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageReporter").finish_non_exhaustive()
    }
}
