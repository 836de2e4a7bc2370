//! Tracked pipeline runs

mod runner;
mod store;

pub use runner::{JobGuard, JobOutcome, JobRunner, JobStoreHandler};
pub use store::{InMemoryJobStore, JobRecord, JobStatus, JobStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("A job is already running")]
    Busy,

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job store error: {0}")]
    Store(String),

    #[error("Failed to serialize job result: {0}")]
    Serialization(#[from] serde_json::Error),
}
