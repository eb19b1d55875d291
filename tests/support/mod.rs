#![allow(dead_code)]

use serde_json::{json, Value};
use stagehand::llm::{MockLLMClient, MockResponse};
use stagehand::{PipelineConfig, PipelineContext};
use std::sync::Arc;

pub fn context_with(
    responses: Vec<MockResponse>,
    config: PipelineConfig,
) -> (Arc<PipelineContext>, Arc<MockLLMClient>) {
    let client = Arc::new(MockLLMClient::new());
    client.add_responses(responses);
    let ctx = PipelineContext::new(client.clone(), config);
    (Arc::new(ctx), client)
}

pub fn route(action: &str) -> MockResponse {
    MockResponse::json(json!({
        "action": action,
        "reasoning": format!("request needs {}", action),
    }))
}

pub fn route_tool(tool: &str) -> MockResponse {
    MockResponse::json(json!({
        "action": "tool",
        "reasoning": "a tool answers this",
        "tool_name": tool,
    }))
}

pub fn plan(steps: usize) -> MockResponse {
    let plan: Vec<Value> = (1..=steps)
        .map(|i| json!({"step": i, "action": format!("Step number {}", i)}))
        .collect();
    MockResponse::json(json!({
        "plan": plan,
        "risks": ["none"],
        "mitigations": [],
        "estimated_duration": "1 minute",
    }))
}

pub fn verdict(status: &str, score: u8, final_output: &str) -> MockResponse {
    MockResponse::json(json!({
        "validation_status": status,
        "quality_score": score,
        "criteria_met": [],
        "criteria_failed": [],
        "issues": [],
        "recommendations": [],
        "final_output": final_output,
    }))
}

pub fn binary() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_stagehand"))
}
