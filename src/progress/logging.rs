//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { run_id, mode } => {
                info!(run_id = %run_id, mode = %mode, "Starting pipeline run");
            }
            ProgressEvent::StageStarted { stage } => {
                info!(stage = %stage, "Starting stage");
            }
            ProgressEvent::ReasoningRequest { stage, attempt } => {
                debug!(stage = %stage, attempt, "Sending request to reasoning service");
            }
            ProgressEvent::ReasoningResponse {
                stage,
                attempt,
                latency,
            } => {
                debug!(
                    stage = %stage,
                    attempt,
                    latency_ms = latency.as_millis() as u64,
                    "Received reasoning response"
                );
            }
            ProgressEvent::ReasoningFailed {
                stage,
                attempt,
                error,
            } => {
                warn!(stage = %stage, attempt, error = %error, "Reasoning attempt failed");
            }
            ProgressEvent::FallbackUsed { stage, reason } => {
                warn!(stage = %stage, reason = %reason, "Using fallback output");
            }
            ProgressEvent::StageComplete {
                stage, duration, ..
            } => {
                info!(
                    stage = %stage,
                    duration_ms = duration.as_millis() as u64,
                    "Stage complete"
                );
            }
            ProgressEvent::StepAdvanced { cursor, plan_len } => {
                info!(
                    progress = format!("{}/{}", cursor, plan_len),
                    "Advanced to next plan step"
                );
            }
            ProgressEvent::Completed {
                stages_run,
                total_time,
            } => {
                info!(
                    stages = stages_run,
                    total_time_ms = total_time.as_millis() as u64,
                    "Pipeline complete"
                );
            }
            ProgressEvent::Failed { error } => {
                warn!(error = %error, "Pipeline failed");
            }
        }
    }
}
