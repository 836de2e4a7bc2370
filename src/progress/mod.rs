//! Progress reporting for pipeline runs

mod bar;
mod handler;
mod logging;
mod reporter;

pub use bar::ProgressBarHandler;
pub use handler::{FanOutHandler, NoOpHandler, ProgressEvent, ProgressHandler, Stage};
pub use logging::LoggingHandler;
pub use reporter::StageReporter;
