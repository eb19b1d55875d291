use super::llm_helper::{build_request, note_fallback, query_structured};
use super::prompts;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::extract::StructuredOutput;
use crate::pipeline::stage_trait::{non_empty_str, require_keys, string_list, Stage, Validation};
use crate::pipeline::state::{
    PipelineMode, PipelineState, StageName, ValidationStatus, ValidatorOutput,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Judges the Executor's evidence and writes the answer the user sees.
///
/// In iterative mode the Validator also moves the step cursor: any verdict
/// other than a genuine `failed` advances it, and a genuine `failed` ends
/// the run.
pub struct ValidatorStage {
    ctx: Arc<PipelineContext>,
}

impl ValidatorStage {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    fn score(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    fn verdict_from(output: &StructuredOutput) -> Option<ValidatorOutput> {
        let validation_status =
            non_empty_str(output, "validation_status").and_then(ValidationStatus::parse)?;
        let quality_score = output
            .get("quality_score")
            .and_then(Self::score)?
            .round()
            .clamp(0.0, 100.0) as u8;

        Some(ValidatorOutput {
            validation_status,
            quality_score,
            criteria_met: string_list(output, "criteria_met"),
            criteria_failed: string_list(output, "criteria_failed"),
            issues: string_list(output, "issues"),
            recommendations: string_list(output, "recommendations"),
            final_output: non_empty_str(output, "final_output")?.to_string(),
            fallback: false,
        })
    }
}

#[async_trait]
impl Stage for ValidatorStage {
    fn name(&self) -> StageName {
        StageName::Validator
    }

    fn validate_output(&self, output: &StructuredOutput) -> Validation {
        let keys = require_keys(output, &["validation_status", "quality_score", "final_output"]);
        if !keys.is_valid() {
            return keys;
        }

        if non_empty_str(output, "validation_status")
            .and_then(ValidationStatus::parse)
            .is_none()
        {
            return Validation::invalid("validation_status is not passed, failed or partial");
        }

        if output.get("quality_score").and_then(Self::score).is_none() {
            return Validation::invalid("quality_score is not a number");
        }

        if non_empty_str(output, "final_output").is_none() {
            return Validation::invalid("final_output is empty");
        }

        Validation::Valid
    }

    async fn execute(&self, state: &mut PipelineState) {
        state.record_stage(StageName::Validator);

        let request = build_request(
            &self.ctx,
            prompts::VALIDATOR_SYSTEM,
            &[],
            prompts::validator_prompt(state),
        );

        let verdict = match query_structured(&self.ctx, state, StageName::Validator, request, |o| {
            self.validate_output(o)
        })
        .await
        .and_then(|o| Self::verdict_from(&o).ok_or_else(|| "unreadable verdict".to_string()))
        {
            Ok(verdict) => verdict,
            Err(reason) => {
                note_fallback(&self.ctx, StageName::Validator, &reason);
                ValidatorOutput::fallback(state.executor.as_ref(), &reason)
            }
        };

        info!(
            stage = "validator",
            status = ?verdict.validation_status,
            quality_score = verdict.quality_score,
            fallback = verdict.fallback,
            "Validation finished"
        );

        if state.mode == PipelineMode::Iterative {
            if verdict.validation_status == ValidationStatus::Failed && !verdict.fallback {
                warn!(
                    cursor = state.step_cursor(),
                    "Step rejected by validation, stopping"
                );
                state.push_error(
                    StageName::Validator,
                    format!("step {} failed validation", state.step_cursor() + 1),
                );
                state.mark_failed();
            } else {
                state.advance_cursor();
            }
        }

        state.final_output = Some(verdict.final_output.clone());
        state.validator = Some(verdict);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{BackendError, MockLLMClient, MockResponse};
    use crate::pipeline::state::{
        ExecutedStep, ExecutorOutput, PipelineStatus, PlanStep, PlannerOutput, UNABLE_TO_GENERATE,
    };
    use crate::pipeline::PipelineConfig;
    use serde_json::json;
    use yare::parameterized;

    fn stage_with(responses: Vec<MockResponse>) -> ValidatorStage {
        let client = Arc::new(MockLLMClient::new());
        client.add_responses(responses);
        let ctx = PipelineContext::new(client, PipelineConfig::default());
        ValidatorStage::new(Arc::new(ctx))
    }

    fn executed_state(mode: PipelineMode) -> PipelineState {
        let mut state = PipelineState::new("sum 1..10").with_mode(mode);
        state.planner = Some(PlannerOutput::fallback("sum 1..10"));
        state.executor = Some(ExecutorOutput::from_steps(
            vec![ExecutedStep::succeeded(PlanStep::new(1, "add"), "55".to_string())],
            true,
        ));
        state
    }

    #[parameterized(
        passed = { json!({"validation_status": "passed", "quality_score": 90, "final_output": "55"}), true },
        string_score = { json!({"validation_status": "Partial", "quality_score": "65", "final_output": "55"}), true },
        bad_status = { json!({"validation_status": "ok", "quality_score": 90, "final_output": "55"}), false },
        bad_score = { json!({"validation_status": "passed", "quality_score": "high", "final_output": "55"}), false },
        empty_output = { json!({"validation_status": "passed", "quality_score": 90, "final_output": " "}), false },
        missing_score = { json!({"validation_status": "passed", "final_output": "55"}), false },
    )]
    fn test_validate_output(value: Value, expected: bool) {
        let stage = stage_with(vec![]);
        let output = value.as_object().cloned().unwrap();
        assert_eq!(stage.validate_output(&output).is_valid(), expected);
    }

    #[test]
    fn test_score_is_clamped() {
        let output = json!({"validation_status": "passed", "quality_score": 140.2, "final_output": "x"});
        let verdict = ValidatorStage::verdict_from(output.as_object().unwrap()).unwrap();
        assert_eq!(verdict.quality_score, 100);
    }

    #[tokio::test]
    async fn test_verdict_sets_final_output() {
        let stage = stage_with(vec![MockResponse::json(json!({
            "validation_status": "passed",
            "quality_score": 95,
            "criteria_met": ["correct sum"],
            "final_output": "The sum is 55."
        }))]);
        let mut state = executed_state(PipelineMode::Linear);

        stage.execute(&mut state).await;

        let verdict = state.validator.as_ref().unwrap();
        assert_eq!(verdict.validation_status, ValidationStatus::Passed);
        assert_eq!(verdict.criteria_met, vec!["correct sum"]);
        assert_eq!(state.final_output.as_deref(), Some("The sum is 55."));
        assert_eq!(state.step_cursor(), 0);
    }

    #[tokio::test]
    async fn test_timeout_uses_executor_result() {
        let stage = stage_with(vec![MockResponse::error(BackendError::TimeoutError {
            seconds: 60,
        })]);
        let mut state = executed_state(PipelineMode::Linear);

        stage.execute(&mut state).await;

        let verdict = state.validator.as_ref().unwrap();
        assert!(verdict.fallback);
        assert_eq!(verdict.validation_status, ValidationStatus::Partial);
        assert_eq!(verdict.quality_score, 70);
        assert_eq!(state.final_output.as_deref(), Some("55"));
    }

    #[tokio::test]
    async fn test_no_executor_output_yields_apology() {
        let stage = stage_with(vec![MockResponse::text("not json")]);
        let mut state = PipelineState::new("x");

        stage.execute(&mut state).await;

        assert_eq!(state.final_output.as_deref(), Some(UNABLE_TO_GENERATE));
        assert_eq!(state.validator.as_ref().unwrap().quality_score, 30);
    }

    #[tokio::test]
    async fn test_iterative_pass_advances_cursor() {
        let stage = stage_with(vec![MockResponse::json(json!({
            "validation_status": "partial",
            "quality_score": 60,
            "final_output": "55"
        }))]);
        let mut state = executed_state(PipelineMode::Iterative);

        stage.execute(&mut state).await;

        assert_eq!(state.step_cursor(), 1);
        assert_ne!(state.status(), PipelineStatus::Failed);
    }

    #[tokio::test]
    async fn test_iterative_rejection_fails_run() {
        let stage = stage_with(vec![MockResponse::json(json!({
            "validation_status": "failed",
            "quality_score": 10,
            "final_output": "The result is wrong."
        }))]);
        let mut state = executed_state(PipelineMode::Iterative);
        state.mark_in_progress();

        stage.execute(&mut state).await;

        assert_eq!(state.status(), PipelineStatus::Failed);
        assert_eq!(state.step_cursor(), 0);
        assert_eq!(state.final_output.as_deref(), Some("The result is wrong."));
    }
}
