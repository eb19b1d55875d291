//! JSONL log of reasoning exchanges
//!
//! One line per attempt: the request sent, the reply or error received, and
//! the latency. Write failures are logged and otherwise ignored; the log must
//! never affect a run.

use crate::llm::{BackendError, LLMRequest, LLMResponse};
use super::state::StageName;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Serialize)]
struct ExchangeEntry<'a> {
    run_id: &'a str,
    stage: StageName,
    attempt: u32,
    request: &'a LLMRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    latency_ms: u64,
    timestamp: DateTime<Utc>,
}

pub struct ExchangeLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl ExchangeLog {
    /// Opens `path` for appending, creating parent directories as needed.
    /// Returns `None` (after a warning) when the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create exchange log directory {:?}: {}", parent, e);
                return None;
            }
        }

        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(Self {
                path,
                writer: Mutex::new(BufWriter::new(file)),
            }),
            Err(e) => {
                warn!("Failed to open exchange log {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(
        &self,
        run_id: &str,
        stage: StageName,
        attempt: u32,
        request: &LLMRequest,
        outcome: Result<&LLMResponse, &BackendError>,
        latency_ms: u64,
    ) {
        let (response, error) = match outcome {
            Ok(response) => (Some(response.content.as_str()), None),
            Err(e) => (None, Some(e.to_string())),
        };

        let entry = ExchangeEntry {
            run_id,
            stage,
            attempt,
            request,
            response,
            error,
            latency_ms,
            timestamp: Utc::now(),
        };

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize exchange for stage {}: {}", stage, e);
                return;
            }
        };

        if let Ok(mut writer) = self.writer.lock() {
            if let Err(e) = writeln!(writer, "{}", json).and_then(|_| writer.flush()) {
                warn!("Failed to write exchange log entry: {}", e);
            }
        }

        debug!(stage = %stage, attempt, latency_ms, "Logged reasoning exchange");
    }
}

impl std::fmt::Debug for ExchangeLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeLog").field("path", &self.path).finish()
    }
}
