use super::llm_helper::{build_request, note_fallback, query_text};
use super::prompts;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::extract::{extract_structured, StructuredOutput};
use crate::pipeline::stage_trait::{non_empty_str, require_keys, Stage, Validation};
use crate::pipeline::state::{
    ExecutedStep, ExecutorOutput, PipelineMode, PipelineState, PlanStep, StageName, StepStatus,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Carries out plan steps and records one piece of evidence per step.
///
/// Linear mode runs the whole plan in order without short-circuiting on a
/// failed step. Iterative mode runs only the step under the cursor and
/// appends it to the evidence gathered so far. A fallback plan is answered
/// directly from the raw request and the conversation history.
pub struct ExecutorStage {
    ctx: Arc<PipelineContext>,
}

impl ExecutorStage {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    fn field_text(output: &StructuredOutput, key: &str) -> Option<String> {
        match output.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            None | Some(Value::Null) | Some(Value::String(_)) => None,
            Some(other) => Some(other.to_string()),
        }
    }

    /// Turns one reply into evidence for `planned`.
    fn classify(planned: PlanStep, reply: Result<String, String>) -> ExecutedStep {
        let text = match reply {
            Ok(text) => text,
            Err(error) => return ExecutedStep::failed(planned, error),
        };

        if let Some(output) = extract_structured(&text) {
            if let Some(status) = non_empty_str(&output, "status").and_then(StepStatus::parse) {
                return ExecutedStep {
                    planned,
                    result: Self::field_text(&output, "result"),
                    status,
                    evidence: Self::field_text(&output, "evidence"),
                    error: Self::field_text(&output, "error"),
                };
            }
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            ExecutedStep {
                planned,
                result: None,
                status: StepStatus::Partial,
                evidence: None,
                error: Some("empty reply".to_string()),
            }
        } else {
            ExecutedStep::succeeded(planned, trimmed.to_string())
        }
    }

    async fn run_step(&self, state: &mut PipelineState, step: PlanStep) -> ExecutedStep {
        let request = build_request(
            &self.ctx,
            prompts::EXECUTOR_SYSTEM,
            &[],
            prompts::step_prompt(&step, state),
        );
        let reply = query_text(&self.ctx, state, StageName::Executor, request).await;
        let executed = Self::classify(step, reply);

        debug!(
            stage = "executor",
            step = executed.planned.step,
            status = %executed.status,
            "Step executed"
        );
        executed
    }

    async fn run_direct(&self, state: &mut PipelineState) -> ExecutedStep {
        let step = state
            .plan()
            .first()
            .cloned()
            .unwrap_or_else(|| PlanStep::new(1, "Process user request directly"));

        let request = build_request(
            &self.ctx,
            prompts::EXECUTOR_SYSTEM,
            state.history(),
            prompts::direct_prompt(state),
        );
        let reply = query_text(&self.ctx, state, StageName::Executor, request).await;
        Self::classify(step, reply)
    }

    fn fallback_output(reason: &str) -> ExecutorOutput {
        let step = ExecutedStep::failed(PlanStep::new(1, "Execute plan"), reason.to_string());
        let mut output = ExecutorOutput::from_steps(vec![step], false);
        output.fallback = true;
        output
    }

    async fn execute_iterative(&self, state: &mut PipelineState) -> Option<ExecutorOutput> {
        let step = match state.current_step() {
            Some(step) => step.clone(),
            None => {
                warn!(cursor = state.step_cursor(), "No plan step under the cursor");
                state.push_error(StageName::Executor, "no plan step left to execute");
                return None;
            }
        };

        let executed = if state.plan_is_fallback() {
            self.run_direct(state).await
        } else {
            self.run_step(state, step).await
        };

        let mut steps = state
            .executor
            .as_ref()
            .map(|o| o.executed_steps.clone())
            .unwrap_or_default();
        steps.push(executed);

        Some(ExecutorOutput::from_steps(steps, state.plan_is_fallback()))
    }

    async fn execute_linear(&self, state: &mut PipelineState) -> ExecutorOutput {
        if state.plan_is_fallback() {
            let executed = self.run_direct(state).await;
            return ExecutorOutput::from_steps(vec![executed], true);
        }

        let plan = state.plan().to_vec();
        let mut steps = Vec::with_capacity(plan.len());
        for step in plan {
            steps.push(self.run_step(state, step).await);
        }
        ExecutorOutput::from_steps(steps, false)
    }
}

#[async_trait]
impl Stage for ExecutorStage {
    fn name(&self) -> StageName {
        StageName::Executor
    }

    fn validate_output(&self, output: &StructuredOutput) -> Validation {
        let keys = require_keys(output, &["executed_steps", "overall_status", "summary"]);
        if !keys.is_valid() {
            return keys;
        }

        match output.get("executed_steps").and_then(Value::as_array) {
            Some(steps) if !steps.is_empty() => {}
            Some(_) => return Validation::invalid("no steps were executed"),
            None => return Validation::invalid("executed_steps is not a list"),
        }

        if non_empty_str(output, "overall_status")
            .and_then(StepStatus::parse)
            .is_none()
        {
            return Validation::invalid("overall_status is not success, partial or failure");
        }

        if non_empty_str(output, "summary").is_none() {
            return Validation::invalid("summary is empty");
        }

        Validation::Valid
    }

    async fn execute(&self, state: &mut PipelineState) {
        state.record_stage(StageName::Executor);

        let output = match state.mode {
            PipelineMode::Linear => Some(self.execute_linear(state).await),
            PipelineMode::Iterative => self.execute_iterative(state).await,
        };

        let output = match output {
            Some(output) => output,
            None if state.executor.is_some() => return,
            None => Self::fallback_output("no plan step left to execute"),
        };

        let checked = serde_json::to_value(&output)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .map(|o| self.validate_output(&o))
            .unwrap_or_else(|| Validation::invalid("output is not an object"));

        let output = match checked {
            Validation::Valid => output,
            Validation::Invalid(reason) => {
                state.push_error(StageName::Executor, format!("invalid output: {}", reason));
                note_fallback(&self.ctx, StageName::Executor, &reason);
                Self::fallback_output(&reason)
            }
        };

        info!(
            stage = "executor",
            steps = output.executed_steps.len(),
            successful = output.count(StepStatus::Success),
            failed = output.count(StepStatus::Failure),
            overall = %output.overall_status,
            "Execution finished"
        );

        state.executor = Some(output);
    }
}
