use crate::llm::{BackendError, ChatMessage, LLMRequest, LLMResponse};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::extract::{extract_structured, StructuredOutput};
use crate::pipeline::stage_trait::Validation;
use crate::pipeline::state::{PipelineState, StageName};
use crate::progress::ProgressEvent;
use std::time::Instant;
use tracing::{debug, warn};

use super::prompts;

/// Builds a request with the stage's system prompt and the configured
/// sampling settings.
pub fn build_request(
    ctx: &PipelineContext,
    system: &str,
    history: &[ChatMessage],
    user_prompt: String,
) -> LLMRequest {
    LLMRequest::from_prompts(prompts::system_prompt(system), history, user_prompt)
        .with_temperature(ctx.config.temperature)
        .with_max_tokens(ctx.config.max_tokens)
}

/// Sends one attempt, bounded by the configured request timeout.
async fn send_once(
    ctx: &PipelineContext,
    run_id: &str,
    stage: StageName,
    attempt: u32,
    request: &LLMRequest,
) -> Result<LLMResponse, BackendError> {
    ctx.emit(ProgressEvent::ReasoningRequest { stage, attempt });

    let start = Instant::now();
    let outcome = match tokio::time::timeout(
        ctx.config.request_timeout,
        ctx.llm_client.chat(request.clone()),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(BackendError::TimeoutError {
            seconds: ctx.config.request_timeout.as_secs(),
        }),
    };
    let latency_ms = start.elapsed().as_millis() as u64;

    if let Some(log) = &ctx.exchange_log {
        log.record(run_id, stage, attempt, request, outcome.as_ref(), latency_ms);
    }

    if outcome.is_ok() {
        ctx.emit(ProgressEvent::ReasoningResponse {
            stage,
            attempt,
            latency: start.elapsed(),
        });
        debug!(stage = %stage, attempt, latency_ms, "Reasoning reply received");
    }

    outcome
}

fn record_failed_attempt(
    ctx: &PipelineContext,
    state: &mut PipelineState,
    stage: StageName,
    attempt: u32,
    error: &str,
) {
    let max = ctx.config.max_attempts;
    warn!(stage = %stage, attempt, max_attempts = max, error = %error, "Reasoning attempt failed");
    state.push_error(stage, format!("attempt {}/{}: {}", attempt, max, error));
    ctx.emit(ProgressEvent::ReasoningFailed {
        stage,
        attempt,
        error: error.to_string(),
    });
}

/// Asks for a structured decision, retrying up to `max_attempts` times.
///
/// An attempt fails on a transport error, a timeout, a reply with no
/// extractable object, or an object `validate` rejects. Every failed attempt
/// is appended to `state.errors`; the last reason is returned once attempts
/// run out so the caller can substitute its fallback.
pub async fn query_structured<F>(
    ctx: &PipelineContext,
    state: &mut PipelineState,
    stage: StageName,
    request: LLMRequest,
    validate: F,
) -> Result<StructuredOutput, String>
where
    F: Fn(&StructuredOutput) -> Validation,
{
    let run_id = state.run_id.clone();
    let mut last_error = String::from("no attempts made");

    for attempt in 1..=ctx.config.max_attempts {
        let failure = match send_once(ctx, &run_id, stage, attempt, &request).await {
            Err(e) => e.to_string(),
            Ok(response) => match extract_structured(&response.content) {
                None => "no structured output in reply".to_string(),
                Some(output) => match validate(&output) {
                    Validation::Valid => return Ok(output),
                    Validation::Invalid(reason) => format!("invalid output: {}", reason),
                },
            },
        };

        record_failed_attempt(ctx, state, stage, attempt, &failure);
        last_error = failure;
    }

    Err(last_error)
}

/// Asks for free text, retrying only on transport errors and timeouts.
/// An empty reply is returned as-is; the caller decides what it means.
pub async fn query_text(
    ctx: &PipelineContext,
    state: &mut PipelineState,
    stage: StageName,
    request: LLMRequest,
) -> Result<String, String> {
    let run_id = state.run_id.clone();
    let mut last_error = String::from("no attempts made");

    for attempt in 1..=ctx.config.max_attempts {
        match send_once(ctx, &run_id, stage, attempt, &request).await {
            Ok(response) => return Ok(response.content),
            Err(e) => {
                let failure = e.to_string();
                record_failed_attempt(ctx, state, stage, attempt, &failure);
                last_error = failure;
            }
        }
    }

    Err(last_error)
}

pub fn note_fallback(ctx: &PipelineContext, stage: StageName, reason: &str) {
    warn!(stage = %stage, reason = %reason, "Substituting fallback output");
    ctx.emit(ProgressEvent::FallbackUsed {
        stage,
        reason: reason.to_string(),
    });
}
