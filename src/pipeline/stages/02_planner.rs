use super::llm_helper::{build_request, note_fallback, query_structured};
use super::prompts;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::extract::StructuredOutput;
use crate::pipeline::stage_trait::{non_empty_str, string_list, Stage, Validation};
use crate::pipeline::state::{PipelineState, PlanStep, PlannerOutput, StageName};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

pub struct PlannerStage {
    ctx: Arc<PipelineContext>,
}

impl PlannerStage {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    fn text_field(step: &StructuredOutput, snake: &str, camel: &str) -> Option<String> {
        non_empty_str(step, snake)
            .or_else(|| non_empty_str(step, camel))
            .map(str::to_string)
    }

    fn parse_step(position: usize, raw: &StructuredOutput) -> PlanStep {
        let number = raw
            .get("step")
            .or_else(|| raw.get("index"))
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(position + 1);

        let action = non_empty_str(raw, "action").unwrap_or_default();
        let mut step = PlanStep::new(number, action);

        step.tool = non_empty_str(raw, "tool")
            .filter(|t| !t.eq_ignore_ascii_case("none"))
            .map(str::to_string);

        step.inputs = match raw.get("inputs") {
            Some(Value::Object(map)) => map.clone(),
            None | Some(Value::Null) => Map::new(),
            Some(other) => {
                let mut wrapped = Map::new();
                wrapped.insert("value".to_string(), other.clone());
                wrapped
            }
        };

        step.expected_output = Self::text_field(raw, "expected_output", "expectedOutput");
        step.success_criteria = Self::text_field(raw, "success_criteria", "successCriteria");
        step
    }

    fn plan_from(output: &StructuredOutput) -> PlannerOutput {
        let plan = output
            .get("plan")
            .and_then(Value::as_array)
            .map(|steps| {
                steps
                    .iter()
                    .filter_map(Value::as_object)
                    .enumerate()
                    .map(|(i, raw)| Self::parse_step(i, raw))
                    .collect()
            })
            .unwrap_or_default();

        let estimated_duration = match output
            .get("estimated_duration")
            .or_else(|| output.get("estimatedDuration"))
        {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        PlannerOutput {
            plan,
            risks: string_list(output, "risks"),
            mitigations: string_list(output, "mitigations"),
            estimated_duration,
            fallback: false,
        }
    }
}

#[async_trait]
impl Stage for PlannerStage {
    fn name(&self) -> StageName {
        StageName::Planner
    }

    fn validate_output(&self, output: &StructuredOutput) -> Validation {
        let steps = match output.get("plan") {
            Some(Value::Array(steps)) => steps,
            Some(_) => return Validation::invalid("plan is not a list"),
            None => return Validation::invalid("missing required keys: plan"),
        };

        if steps.is_empty() {
            return Validation::invalid("plan has no steps");
        }

        for (i, step) in steps.iter().enumerate() {
            match step.as_object() {
                Some(obj) if non_empty_str(obj, "action").is_some() => {}
                Some(_) => return Validation::invalid(format!("step {} has no action", i + 1)),
                None => return Validation::invalid(format!("step {} is not an object", i + 1)),
            }
        }

        Validation::Valid
    }

    async fn execute(&self, state: &mut PipelineState) {
        state.record_stage(StageName::Planner);

        let request = build_request(
            &self.ctx,
            prompts::PLANNER_SYSTEM,
            &[],
            prompts::planner_prompt(state),
        );

        let plan = match query_structured(&self.ctx, state, StageName::Planner, request, |o| {
            self.validate_output(o)
        })
        .await
        {
            Ok(output) => Self::plan_from(&output),
            Err(reason) => {
                note_fallback(&self.ctx, StageName::Planner, &reason);
                PlannerOutput::fallback(state.user_input())
            }
        };

        info!(
            stage = "planner",
            steps = plan.plan.len(),
            risks = plan.risks.len(),
            fallback = plan.fallback,
            "Plan ready"
        );

        state.planner = Some(plan);
    }
}
