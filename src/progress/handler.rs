//! Progress handler trait and events

use crate::pipeline::{PipelineMode, StageName};
use std::time::Duration;

/// Events emitted while a pipeline run is in flight
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Controller took ownership of a new state
    Started {
        run_id: String,
        mode: PipelineMode,
    },

    StageStarted { stage: StageName },

    /// A reasoning call is about to be sent
    ReasoningRequest { stage: StageName, attempt: u32 },

    ReasoningResponse {
        stage: StageName,
        attempt: u32,
        latency: Duration,
    },

    /// One attempt failed (transport, timeout, extraction or validation)
    ReasoningFailed {
        stage: StageName,
        attempt: u32,
        error: String,
    },

    /// Stage substituted its deterministic fallback output
    FallbackUsed { stage: StageName, reason: String },

    /// Stage wrote its output slot; `output` is the JSON form of that slot
    StageComplete {
        stage: StageName,
        output: serde_json::Value,
        duration: Duration,
    },

    /// Iterative mode moved to the next plan step
    StepAdvanced { cursor: usize, plan_len: usize },

    Completed {
        stages_run: usize,
        total_time: Duration,
    },

    Failed { error: String },
}

/// Trait for handling progress events during a run
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
