//! Job records and where they live

use super::JobError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Error,
}

/// Durable view of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub stage: Option<String>,
    /// Overall progress, 0-100
    pub progress: f32,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Running,
            stage: None,
            progress: 0.0,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persistence for job records. Implementations must be callable from
/// progress handlers, so every method is synchronous and quick.
pub trait JobStore: Send + Sync {
    fn create(&self, id: &str) -> Result<JobRecord, JobError>;

    fn update_progress(&self, id: &str, stage: &str, progress: f32) -> Result<(), JobError>;

    fn complete(&self, id: &str, result: serde_json::Value) -> Result<(), JobError>;

    fn fail(&self, id: &str, error: &str) -> Result<(), JobError>;

    fn get(&self, id: &str) -> Option<JobRecord>;
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    records: Mutex<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_record<F>(&self, id: &str, update: F) -> Result<(), JobError>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        let record = records
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        update(record);
        record.updated_at = Utc::now();
        Ok(())
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, id: &str) -> Result<JobRecord, JobError> {
        let mut records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        if records.contains_key(id) {
            return Err(JobError::Store(format!("job {} already exists", id)));
        }
        let record = JobRecord::new(id);
        records.insert(id.to_string(), record.clone());
        Ok(record)
    }

    fn update_progress(&self, id: &str, stage: &str, progress: f32) -> Result<(), JobError> {
        self.with_record(id, |record| {
            record.stage = Some(stage.to_string());
            // Progress never moves backwards.
            record.progress = record.progress.max(progress.clamp(0.0, 100.0));
        })
    }

    fn complete(&self, id: &str, result: serde_json::Value) -> Result<(), JobError> {
        self.with_record(id, |record| {
            record.status = JobStatus::Completed;
            record.progress = 100.0;
            record.result = Some(result);
        })
    }

    fn fail(&self, id: &str, error: &str) -> Result<(), JobError> {
        self.with_record(id, |record| {
            record.status = JobStatus::Error;
            record.error = Some(error.to_string());
        })
    }

    fn get(&self, id: &str) -> Option<JobRecord> {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(id)
            .cloned()
    }
}
