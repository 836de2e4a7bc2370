//! Terminal progress bar for the CLI

use super::{ProgressEvent, ProgressHandler};
use indicatif::{ProgressBar, ProgressStyle};

pub struct ProgressBarHandler {
    bar: ProgressBar,
}

impl ProgressBarHandler {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(100))
    }

    /// Hidden bar; used when stderr is not a terminal and in tests.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        let style = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
        bar.set_style(style);
        Self { bar }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for ProgressBarHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHandler for ProgressBarHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { .. } => {
                self.bar.set_position(0);
                self.bar.set_message("starting");
            }
            ProgressEvent::PhaseStarted { phase } => {
                self.bar.set_message(phase.clone());
            }
            ProgressEvent::Stage {
                percent, message, ..
            } => {
                let position = percent.clamp(0.0, 100.0) as u64;
                // Never move backwards
                if position > self.bar.position() {
                    self.bar.set_position(position);
                }
                self.bar.set_message(message.clone());
            }
            ProgressEvent::PhaseComplete { .. } => {}
            ProgressEvent::Completed { entries, .. } => {
                self.bar.set_position(100);
                self.bar
                    .finish_with_message(format!("done, {} plan entries", entries));
            }
            ProgressEvent::Failed { error } => {
                self.bar.abandon_with_message(format!("failed: {}", error));
            }
        }
    }
}
