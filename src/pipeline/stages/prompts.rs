//! Prompt text for each stage
//!
//! System prompts describe the JSON shape a stage expects back; user prompts
//! are rendered from the current state.

use crate::pipeline::state::{PipelineState, PlanStep};

const SHARED_RULES: &str = "\
Rules for every answer:
- Be precise and accurate.
- Put safety first: never suggest destructive or irreversible actions.
- Reply with a single JSON object and nothing else unless told otherwise.";

pub const ROUTER_SYSTEM: &str = "\
You are the router of a staged assistant. Decide how the user's request should be handled.

Choose exactly one action:
- \"chat\": answer conversationally (questions, explanations, advice).
- \"code\": the request needs a small program to be written and run.
- \"tool\": one of the available tools answers the request directly.

Reply with:
{
  \"action\": \"chat|code|tool\",
  \"reasoning\": \"why this action fits\",
  \"tool_name\": \"required when action is tool\",
  \"suggested_description\": \"for code: a precise description of the program\",
  \"complexity\": \"simple|medium|complex\",
  \"required_tools\": [\"tool names\"]
}";

pub const PLANNER_SYSTEM: &str = "\
You are the planner of a staged assistant. Break the request into concrete, ordered steps.

Reply with:
{
  \"plan\": [
    {
      \"step\": 1,
      \"action\": \"what to do\",
      \"tool\": \"tool name or null\",
      \"inputs\": {},
      \"expected_output\": \"what this step produces\",
      \"success_criteria\": \"how to tell it worked\"
    }
  ],
  \"risks\": [\"what could go wrong\"],
  \"mitigations\": [\"how to handle it\"],
  \"estimated_duration\": \"rough estimate\"
}
The plan must contain at least one step.";

pub const EXECUTOR_SYSTEM: &str = "\
You are the executor of a staged assistant. Carry out the step you are given and report the result.

Reply with:
{
  \"status\": \"success|partial|failure\",
  \"result\": \"the outcome of the step\",
  \"evidence\": \"what shows the step was done\",
  \"error\": \"what went wrong, if anything\"
}
If a JSON reply is not possible, reply with the result text alone.";

pub const VALIDATOR_SYSTEM: &str = "\
You are the validator of a staged assistant. Check the execution results against the request and the plan's success criteria, then write the answer the user will see.

Reply with:
{
  \"validation_status\": \"passed|failed|partial\",
  \"quality_score\": 0,
  \"criteria_met\": [\"...\"],
  \"criteria_failed\": [\"...\"],
  \"issues\": [\"...\"],
  \"recommendations\": [\"...\"],
  \"final_output\": \"the approved answer for the user\"
}
quality_score is an integer from 0 to 100.";

pub const CODE_SYSTEM: &str = "\
You write short, self-contained Python 3 programs. Reply with a single ```python fenced block and no other text. \
The program must print its result to stdout, must not read from stdin, and must not touch files outside its working directory.";

pub fn system_prompt(base: &str) -> String {
    format!("{}\n\n{}", base, SHARED_RULES)
}

fn tools_line(state: &PipelineState) -> String {
    if state.available_tools.is_empty() {
        "none".to_string()
    } else {
        state.available_tools.join(", ")
    }
}

fn to_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn router_prompt(state: &PipelineState) -> String {
    format!(
        "Route this request.\n\nRequest: {}\nAvailable tools: {}",
        state.user_input(),
        tools_line(state)
    )
}

pub fn planner_prompt(state: &PipelineState) -> String {
    let routing = state
        .router
        .as_ref()
        .map(|value| to_json(value))
        .unwrap_or_else(|| "none".to_string());

    format!(
        "Create an execution plan.\n\nRequest: {}\nRouting decision: {}\nAvailable tools: {}",
        state.user_input(),
        routing,
        tools_line(state)
    )
}

pub fn step_prompt(step: &PlanStep, state: &PipelineState) -> String {
    let inputs = if step.inputs.is_empty() {
        "{}".to_string()
    } else {
        to_json(&step.inputs)
    };

    let mut prompt = format!(
        "Execute this step of the plan for the request \"{}\".\n\nStep {}: {}\nTool: {}\nInputs: {}",
        state.user_input(),
        step.step,
        step.action,
        step.tool.as_deref().unwrap_or("none"),
        inputs
    );
    if let Some(expected) = &step.expected_output {
        prompt.push_str(&format!("\nExpected output: {}", expected));
    }
    if let Some(criteria) = &step.success_criteria {
        prompt.push_str(&format!("\nSuccess criteria: {}", criteria));
    }
    prompt
}

pub fn direct_prompt(state: &PipelineState) -> String {
    format!(
        "No detailed plan is available. Answer the request directly.\n\nRequest: {}\nAvailable tools: {}",
        state.user_input(),
        tools_line(state)
    )
}

pub fn validator_prompt(state: &PipelineState) -> String {
    let plan = state
        .planner
        .as_ref()
        .map(|p| to_json(&p.plan))
        .unwrap_or_else(|| "[]".to_string());
    let results = state
        .executor
        .as_ref()
        .map(|value| to_json(value))
        .unwrap_or_else(|| "none".to_string());

    format!(
        "Validate the execution results.\n\nOriginal request: {}\nExecution plan: {}\nExecution results: {}",
        state.user_input(),
        plan,
        results
    )
}

pub fn code_prompt(description: &str) -> String {
    format!("Write a Python program for this task:\n\n{}", description)
}
