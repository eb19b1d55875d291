//! End-to-end pipeline runs against a scripted reasoning service

mod support;

use async_trait::async_trait;
use serde_json::json;
use stagehand::llm::{BackendError, MockResponse};
use stagehand::pipeline::{
    ExecutorStage, PlanStep, PlannerOutput, PlannerStage, RouteAction, RouterStage, StepStatus,
    StructuredOutput, Validation, ValidationStatus, ValidatorOutput, ValidatorStage,
    UNABLE_TO_GENERATE,
};
use stagehand::{
    ChannelHandler, NoOpHandler, PipelineConfig, PipelineController, PipelineError, PipelineMode,
    PipelineState, PipelineStatus, ProgressEvent, Stage, StageName,
};
use std::sync::Arc;
use std::time::Duration;
use support::{context_with, plan, route, verdict};

fn linear() -> PipelineConfig {
    PipelineConfig::default()
}

fn iterative() -> PipelineConfig {
    PipelineConfig::default().with_mode(PipelineMode::Iterative)
}

#[tokio::test]
async fn test_linear_happy_path() {
    let (ctx, client) = context_with(
        vec![
            route("chat"),
            plan(2),
            MockResponse::text("first result"),
            MockResponse::json(json!({"status": "success", "result": "second result"})),
            verdict("passed", 92, "All done."),
        ],
        linear(),
    );
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("do two things");

    controller.run(&mut state).await.unwrap();

    assert_eq!(state.status(), PipelineStatus::Completed);
    assert_eq!(state.execution_history(), &StageName::ALL);
    assert_eq!(state.final_output.as_deref(), Some("All done."));
    assert!(state.errors().is_empty());
    assert!(state.fallback_stages().is_empty());
    assert_eq!(client.remaining_responses(), 0);
}

#[tokio::test]
async fn test_malformed_routing_defaults_to_chat() {
    let (ctx, _) = context_with(
        vec![
            MockResponse::text("I think CODE is needed"),
            plan(1),
            MockResponse::text("Here is a plain answer"),
            verdict("passed", 80, "Here is a plain answer"),
        ],
        linear(),
    );
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("run something");

    controller.run(&mut state).await.unwrap();

    let decision = state.router.as_ref().unwrap();
    assert_eq!(decision.action, RouteAction::Chat);
    assert!(decision.fallback);
    assert_eq!(state.status(), PipelineStatus::Completed);
    assert_eq!(state.final_output.as_deref(), Some("Here is a plain answer"));
}

#[tokio::test]
async fn test_empty_plan_triggers_direct_execution() {
    let (ctx, client) = context_with(
        vec![
            route("chat"),
            MockResponse::json(json!({"plan": []})),
            MockResponse::text("Direct answer"),
            verdict("passed", 75, "Direct answer"),
        ],
        linear(),
    );
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("what is 2+2?");

    controller.run(&mut state).await.unwrap();

    assert!(state.planner.as_ref().unwrap().fallback);
    let executor = state.executor.as_ref().unwrap();
    assert!(executor.direct);
    assert_eq!(executor.executed_steps.len(), 1);
    assert_eq!(client.requests()[2].user_prompt().map(|p| p.contains("what is 2+2?")), Some(true));
}

#[tokio::test]
async fn test_validator_fallback_picks_latest_success_before_failure() {
    let (ctx, _) = context_with(
        vec![
            route("chat"),
            plan(3),
            MockResponse::text("alpha"),
            MockResponse::text("beta"),
            MockResponse::error(BackendError::ApiError {
                message: "overloaded".to_string(),
                status_code: Some(529),
            }),
            MockResponse::text("no verdict here"),
        ],
        linear(),
    );
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("three steps");

    controller.run(&mut state).await.unwrap();

    let executor = state.executor.as_ref().unwrap();
    assert_eq!(executor.executed_steps.len(), 3);
    assert_eq!(executor.overall_status, StepStatus::Failure);

    let verdict = state.validator.as_ref().unwrap();
    assert!(verdict.fallback);
    assert_eq!(verdict.final_output, "beta");
    assert_eq!(verdict.validation_status, ValidationStatus::Failed);
    assert_eq!(state.status(), PipelineStatus::Completed);
}

#[tokio::test]
async fn test_validator_timeout_degrades_gracefully() {
    let config = linear().with_request_timeout(Duration::from_millis(100));
    let (ctx, _) = context_with(
        vec![
            route("chat"),
            plan(2),
            MockResponse::text("partly"),
            MockResponse::json(json!({"status": "partial", "result": "half"})),
            verdict("passed", 99, "never seen").delayed(Duration::from_secs(2)),
        ],
        config,
    );
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("slow validation");

    controller.run(&mut state).await.unwrap();

    let verdict = state.validator.as_ref().unwrap();
    assert_eq!(verdict.validation_status, ValidationStatus::Failed);
    assert_eq!(verdict.quality_score, 30);
    assert_eq!(state.final_output.as_deref(), Some("partly"));
    assert_eq!(state.status(), PipelineStatus::Completed);
    assert!(state
        .errors()
        .iter()
        .any(|e| e.starts_with("[validator]") && e.contains("timed out")));
}

#[tokio::test]
async fn test_total_outage_still_completes_with_apology_or_summary() {
    let (ctx, _) = context_with(vec![], linear());
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("anything");

    controller.run(&mut state).await.unwrap();

    assert_eq!(state.status(), PipelineStatus::Completed);
    assert_eq!(
        state.fallback_stages(),
        vec![StageName::Router, StageName::Planner, StageName::Validator]
    );
    assert_eq!(state.plan().len(), 1);
    let output = state.final_output.as_deref().unwrap();
    assert!(output.starts_with("Executed 1 steps") || output == UNABLE_TO_GENERATE);
}

#[tokio::test]
async fn test_retries_happen_before_fallback() {
    let config = linear().with_max_attempts(2);
    let (ctx, client) = context_with(
        vec![
            MockResponse::text("not json"),
            route("chat"),
            plan(1),
            MockResponse::text("ok"),
            verdict("passed", 90, "ok"),
        ],
        config,
    );
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("retry me");

    controller.run(&mut state).await.unwrap();

    assert!(!state.router.as_ref().unwrap().fallback);
    assert_eq!(state.errors().len(), 1);
    assert!(state.errors()[0].contains("attempt 1/2"));
    assert_eq!(client.request_count(), 5);
}

#[tokio::test]
async fn test_missing_stage_is_fatal() {
    let (ctx, _) = context_with(vec![], linear());
    let controller = PipelineController::new(PipelineMode::Linear, Arc::new(NoOpHandler))
        .with_stage(Box::new(RouterStage::new(ctx.clone())))
        .with_stage(Box::new(PlannerStage::new(ctx.clone())))
        .with_stage(Box::new(ValidatorStage::new(ctx)));
    let mut state = PipelineState::new("hi");

    let err = controller.run(&mut state).await.unwrap_err();

    assert_eq!(err, PipelineError::MissingStages(vec![StageName::Executor]));
    assert_eq!(state.status(), PipelineStatus::Failed);
    assert!(state.final_output.is_none());
    assert!(state.execution_history().is_empty());
}

/// Records a verdict but never moves the cursor.
struct StuckValidator;

#[async_trait]
impl Stage for StuckValidator {
    fn name(&self) -> StageName {
        StageName::Validator
    }

    fn validate_output(&self, _output: &StructuredOutput) -> Validation {
        Validation::Valid
    }

    async fn execute(&self, state: &mut PipelineState) {
        state.record_stage(StageName::Validator);
        state.validator = Some(ValidatorOutput::fallback(state.executor.as_ref(), "stuck"));
    }
}

#[tokio::test]
async fn test_non_advancing_loop_is_fatal() {
    let (ctx, _) = context_with(
        vec![route("chat"), plan(2), MockResponse::text("step one")],
        iterative(),
    );
    let controller = PipelineController::standard(ctx).with_stage(Box::new(StuckValidator));
    let mut state = PipelineState::new("loop forever?");

    let err = controller.run(&mut state).await.unwrap_err();

    assert_eq!(
        err,
        PipelineError::NonAdvancingLoop {
            cursor: 0,
            plan_len: 2
        }
    );
    assert_eq!(state.status(), PipelineStatus::Failed);
    assert!(state.errors().last().unwrap().starts_with("[pipeline]"));
    assert_eq!(
        state.execution_history(),
        &[
            StageName::Router,
            StageName::Planner,
            StageName::Executor,
            StageName::Validator
        ]
    );
}

#[tokio::test]
async fn test_iterative_runs_executor_and_validator_per_step() {
    let (handler, mut events) = ChannelHandler::new();
    let (ctx, _) = context_with(
        vec![
            route("chat"),
            plan(2),
            MockResponse::text("one"),
            verdict("passed", 90, "one"),
            MockResponse::text("two"),
            verdict("partial", 70, "one and two"),
        ],
        iterative(),
    );
    let controller = PipelineController::new(PipelineMode::Iterative, Arc::new(handler))
        .with_stage(Box::new(RouterStage::new(ctx.clone())))
        .with_stage(Box::new(PlannerStage::new(ctx.clone())))
        .with_stage(Box::new(ExecutorStage::new(ctx.clone())))
        .with_stage(Box::new(ValidatorStage::new(ctx)));
    let mut state = PipelineState::new("two steps");

    controller.run(&mut state).await.unwrap();

    assert_eq!(state.status(), PipelineStatus::Completed);
    assert_eq!(state.step_cursor(), 2);
    assert_eq!(state.executor.as_ref().unwrap().executed_steps.len(), 2);
    assert_eq!(state.final_output.as_deref(), Some("one and two"));
    assert_eq!(
        state.execution_history(),
        &[
            StageName::Router,
            StageName::Planner,
            StageName::Executor,
            StageName::Validator,
            StageName::Executor,
            StageName::Validator
        ]
    );

    let mut advanced = Vec::new();
    let mut completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            ProgressEvent::StepAdvanced { cursor, plan_len } => advanced.push((cursor, plan_len)),
            ProgressEvent::Completed { stages_run, .. } => {
                completed = true;
                assert_eq!(stages_run, 6);
            }
            _ => {}
        }
    }
    assert_eq!(advanced, vec![(1, 2), (2, 2)]);
    assert!(completed);
}

#[tokio::test]
async fn test_iterative_rejection_stops_run() {
    let (ctx, client) = context_with(
        vec![
            route("chat"),
            plan(3),
            MockResponse::text("wrong"),
            verdict("failed", 10, "Step one produced the wrong result."),
        ],
        iterative(),
    );
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("three steps");

    controller.run(&mut state).await.unwrap();

    assert_eq!(state.status(), PipelineStatus::Failed);
    assert_eq!(state.executor.as_ref().unwrap().executed_steps.len(), 1);
    assert_eq!(client.request_count(), 4);
}

#[tokio::test]
async fn test_iterative_validator_outage_still_walks_the_plan() {
    let config = iterative().with_request_timeout(Duration::from_millis(100));
    let (ctx, _) = context_with(
        vec![
            route("chat"),
            plan(3),
            MockResponse::text("alpha"),
            MockResponse::text("no verdict here"),
            MockResponse::text("beta"),
            verdict("passed", 99, "never seen").delayed(Duration::from_secs(2)),
            MockResponse::error(BackendError::NetworkError {
                message: "connection reset".to_string(),
            }),
            MockResponse::text("still no verdict"),
        ],
        config,
    );
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("three steps, no judge");

    let result = controller.run(&mut state).await;

    assert_eq!(result, Ok(()));
    assert_eq!(state.status(), PipelineStatus::Completed);
    assert_eq!(state.step_cursor(), state.plan().len());
    assert_eq!(state.step_cursor(), 3);
    assert_eq!(state.executor.as_ref().unwrap().executed_steps.len(), 3);

    let verdict = state.validator.as_ref().unwrap();
    assert!(verdict.fallback);
    assert_eq!(verdict.validation_status, ValidationStatus::Failed);
    assert_eq!(state.final_output.as_deref(), Some("beta"));
    assert!(!state.errors().iter().any(|e| e.starts_with("[pipeline]")));
    assert!(state
        .errors()
        .iter()
        .any(|e| e.starts_with("[validator]") && e.contains("timed out")));
}

#[tokio::test]
async fn test_iterative_resumes_existing_plan() {
    let (ctx, client) = context_with(
        vec![MockResponse::text("resumed"), verdict("passed", 90, "resumed")],
        iterative(),
    );
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("resume");
    state.planner = Some(PlannerOutput {
        plan: vec![PlanStep::new(1, "only step")],
        risks: vec![],
        mitigations: vec![],
        estimated_duration: None,
        fallback: false,
    });

    controller.run(&mut state).await.unwrap();

    assert_eq!(
        state.execution_history(),
        &[StageName::Executor, StageName::Validator]
    );
    assert!(state.router.is_none());
    assert_eq!(client.request_count(), 2);
}

/// Marks the run failed as soon as it executes.
struct AbortingPlanner;

#[async_trait]
impl Stage for AbortingPlanner {
    fn name(&self) -> StageName {
        StageName::Planner
    }

    fn validate_output(&self, _output: &StructuredOutput) -> Validation {
        Validation::Valid
    }

    async fn execute(&self, state: &mut PipelineState) {
        state.record_stage(StageName::Planner);
        state.push_error(StageName::Planner, "refusing to plan");
        state.mark_failed();
    }
}

#[tokio::test]
async fn test_stage_failure_halts_linear_run() {
    let (handler, mut events) = ChannelHandler::new();
    let (ctx, client) = context_with(vec![route("chat")], linear());
    let controller = PipelineController::new(PipelineMode::Linear, Arc::new(handler))
        .with_stage(Box::new(RouterStage::new(ctx.clone())))
        .with_stage(Box::new(AbortingPlanner))
        .with_stage(Box::new(ExecutorStage::new(ctx.clone())))
        .with_stage(Box::new(ValidatorStage::new(ctx)));
    let mut state = PipelineState::new("stop early");

    controller.run(&mut state).await.unwrap();

    assert_eq!(state.status(), PipelineStatus::Failed);
    assert_eq!(
        state.execution_history(),
        &[StageName::Router, StageName::Planner]
    );
    assert!(state.validator.is_none());
    assert_eq!(client.request_count(), 1);

    let mut failure = None;
    while let Ok(event) = events.try_recv() {
        if let ProgressEvent::Failed { error } = event {
            failure = Some(error);
        }
    }
    assert_eq!(failure.as_deref(), Some("[planner] refusing to plan"));
}

#[tokio::test]
async fn test_terminal_status_is_absorbing() {
    let (ctx, client) = context_with(
        vec![route("chat"), plan(1), MockResponse::text("x"), verdict("passed", 90, "x")],
        linear(),
    );
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("once");

    controller.run(&mut state).await.unwrap();
    let history = state.execution_history().len();
    controller.run(&mut state).await.unwrap();

    assert_eq!(state.status(), PipelineStatus::Completed);
    assert_eq!(state.execution_history().len(), history);
    assert!(!state.mark_failed());
    assert_eq!(client.request_count(), 4);
}

#[tokio::test]
async fn test_every_stage_output_slot_is_written() {
    let (ctx, _) = context_with(vec![MockResponse::text("")], linear());
    let controller = PipelineController::standard(ctx);
    let mut state = PipelineState::new("blank replies");

    controller.run(&mut state).await.unwrap();

    for stage in StageName::ALL {
        assert!(state.has_output(stage), "{} output missing", stage);
    }
    assert!(state.final_output.is_some());
}
