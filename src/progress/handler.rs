//! Progress handler trait and events

use std::fmt;
use std::time::Duration;

/// Pipeline stage as seen by progress consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Search,
    Extract,
    Rank,
    Synthesize,
    Enrich,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Search => "search",
            Stage::Extract => "extract",
            Stage::Rank => "rank",
            Stage::Synthesize => "synthesize",
            Stage::Enrich => "enrichment",
        }
    }

    /// Slice of the overall 0-100 range owned by this stage.
    pub fn range(&self) -> (f32, f32) {
        match self {
            Stage::Search => (0.0, 15.0),
            Stage::Extract => (15.0, 40.0),
            Stage::Rank => (40.0, 55.0),
            Stage::Synthesize => (55.0, 70.0),
            Stage::Enrich => (70.0, 100.0),
        }
    }

    /// Maps a stage-local percentage onto the overall scale.
    pub fn overall_percent(&self, local_percent: f32) -> f32 {
        let (start, end) = self.range();
        let local = local_percent.clamp(0.0, 100.0);
        start + (end - start) * local / 100.0
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted while a pipeline run progresses
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started
    Started { job_id: String },

    /// Orchestrator entered a phase
    PhaseStarted { phase: String },

    /// Stage-level progress; `percent` is already on the overall 0-100 scale
    Stage {
        stage: Stage,
        percent: f32,
        message: String,
    },

    /// Orchestrator left a phase
    PhaseComplete { phase: String, duration: Duration },

    /// Run finished with a plan
    Completed { entries: usize, total_time: Duration },

    /// Run failed
    Failed { error: String },
}

/// Receives progress events. Implementations must return promptly.
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Fans one event out to several handlers.
pub struct FanOutHandler {
    handlers: Vec<std::sync::Arc<dyn ProgressHandler>>,
}

impl FanOutHandler {
    pub fn new(handlers: Vec<std::sync::Arc<dyn ProgressHandler>>) -> Self {
        Self { handlers }
    }
}

impl ProgressHandler for FanOutHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        for handler in &self.handlers {
            handler.on_progress(event);
        }
    }
}
