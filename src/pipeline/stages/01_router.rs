use super::llm_helper::{build_request, note_fallback, query_structured};
use super::prompts;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::extract::StructuredOutput;
use crate::pipeline::stage_trait::{non_empty_str, require_keys, string_list, Stage, Validation};
use crate::pipeline::state::{Complexity, PipelineState, RouteAction, RouterDecision, StageName};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Decides whether a request is answered by chat, a tool, or generated code.
///
/// Any doubt resolves to chat: an unparseable or invalid decision must never
/// lead to code execution or a tool call.
pub struct RouterStage {
    ctx: Arc<PipelineContext>,
}

impl RouterStage {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    fn tool_name(output: &StructuredOutput) -> Option<&str> {
        non_empty_str(output, "tool_name").or_else(|| non_empty_str(output, "toolName"))
    }

    fn decision_from(output: &StructuredOutput) -> RouterDecision {
        let action = output
            .get("action")
            .and_then(|v| v.as_str())
            .and_then(RouteAction::parse)
            .unwrap_or(RouteAction::Chat);

        let suggested_description = non_empty_str(output, "suggested_description")
            .or_else(|| non_empty_str(output, "suggestedDescription"))
            .map(str::to_string);

        let mut required_tools = string_list(output, "required_tools");
        if required_tools.is_empty() {
            required_tools = string_list(output, "requiredTools");
        }

        RouterDecision {
            action,
            reasoning: non_empty_str(output, "reasoning")
                .unwrap_or_default()
                .to_string(),
            tool_name: Self::tool_name(output).map(str::to_string),
            suggested_description,
            complexity: non_empty_str(output, "complexity").and_then(Complexity::parse),
            required_tools,
            fallback: false,
        }
    }
}

#[async_trait]
impl Stage for RouterStage {
    fn name(&self) -> StageName {
        StageName::Router
    }

    fn validate_output(&self, output: &StructuredOutput) -> Validation {
        let keys = require_keys(output, &["action", "reasoning"]);
        if !keys.is_valid() {
            return keys;
        }

        let action = match output.get("action").and_then(|v| v.as_str()) {
            Some(raw) => match RouteAction::parse(raw) {
                Some(action) => action,
                None => return Validation::invalid(format!("unknown action '{}'", raw)),
            },
            None => return Validation::invalid("action is not a string"),
        };

        if action == RouteAction::Tool && Self::tool_name(output).is_none() {
            return Validation::invalid("action is tool but no tool_name was given");
        }

        Validation::Valid
    }

    async fn execute(&self, state: &mut PipelineState) {
        state.record_stage(StageName::Router);

        let request = build_request(
            &self.ctx,
            prompts::ROUTER_SYSTEM,
            state.history(),
            prompts::router_prompt(state),
        );

        let decision = match query_structured(&self.ctx, state, StageName::Router, request, |o| {
            self.validate_output(o)
        })
        .await
        {
            Ok(output) => Self::decision_from(&output),
            Err(reason) => {
                note_fallback(&self.ctx, StageName::Router, &reason);
                RouterDecision::fallback(&reason)
            }
        };

        info!(
            stage = "router",
            action = decision.action.as_str(),
            tool = decision.tool_name.as_deref().unwrap_or("-"),
            fallback = decision.fallback,
            "Routing decision"
        );

        state.router = Some(decision);
    }
}
