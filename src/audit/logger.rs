// JSONL audit trail of model exchanges, one object per call
use crate::llm::{BackendError, LLMRequest, LLMResponse};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

#[derive(Serialize)]
struct ExchangeRecord<'a> {
    timestamp: String,
    operation: &'a str,
    backend: &'a str,
    latency_ms: u64,
    request: &'a LLMRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Appends every model call, failed ones included, to a file.
///
/// Cloning shares the file handle. A logger whose file could not be opened
/// behaves like [`ExchangeLogger::disabled`].
#[derive(Clone, Default)]
pub struct ExchangeLogger {
    sink: Option<Arc<Mutex<File>>>,
}

impl ExchangeLogger {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            sink: path.and_then(|p| open_append(&p)).map(|f| Arc::new(Mutex::new(f))),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn record(
        &self,
        operation: &str,
        backend: &str,
        request: &LLMRequest,
        outcome: Result<&LLMResponse, &BackendError>,
        latency_ms: u64,
    ) {
        let Some(sink) = &self.sink else {
            return;
        };

        let record = ExchangeRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            operation,
            backend,
            latency_ms,
            request,
            answer: outcome.ok().map(|r| r.content.as_str()),
            error: outcome.err().map(|e| e.to_string()),
        };
        let mut line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(operation, "Exchange not logged: {}", e);
                return;
            }
        };
        line.push('\n');

        let mut file = sink.lock().unwrap_or_else(|p| p.into_inner());
        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!(operation, "Exchange log write failed: {}", e);
        }
    }
}

fn open_append(path: &Path) -> Option<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| warn!("Exchange log {} unavailable: {}", path.display(), e))
        .ok()
}

impl std::fmt::Debug for ExchangeLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeLogger")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
