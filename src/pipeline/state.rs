//! Pipeline state container and typed stage outputs
//!
//! One [`PipelineState`] exists per user request. The controller owns it for
//! the whole run and lends it to each stage in turn. Append-only fields
//! (`execution_history`, `errors`) and the status machine are only reachable
//! through methods so their invariants cannot be broken from outside.

use crate::llm::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Router,
    Planner,
    Executor,
    Validator,
}

impl StageName {
    pub const ALL: [StageName; 4] = [
        StageName::Router,
        StageName::Planner,
        StageName::Executor,
        StageName::Validator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Router => "router",
            StageName::Planner => "planner",
            StageName::Executor => "executor",
            StageName::Validator => "validator",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run status. `Completed` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl PipelineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Completed | PipelineStatus::Failed)
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStatus::Pending => "PENDING",
            PipelineStatus::InProgress => "IN_PROGRESS",
            PipelineStatus::Completed => "COMPLETED",
            PipelineStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Router, Planner, Executor, Validator, each once
    #[default]
    Linear,
    /// Router and Planner once, then Executor/Validator per plan step
    Iterative,
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineMode::Linear => f.write_str("linear"),
            PipelineMode::Iterative => f.write_str("iterative"),
        }
    }
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "linear" => Ok(PipelineMode::Linear),
            "iterative" => Ok(PipelineMode::Iterative),
            other => Err(format!(
                "Unknown pipeline mode '{}'. Valid modes: linear, iterative",
                other
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteAction {
    Chat,
    Code,
    Tool,
}

impl RouteAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "chat" => Some(RouteAction::Chat),
            "code" => Some(RouteAction::Code),
            "tool" => Some(RouteAction::Tool),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteAction::Chat => "chat",
            RouteAction::Code => "code",
            RouteAction::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Medium,
    Complex,
}

impl Complexity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Some(Complexity::Simple),
            "medium" => Some(Complexity::Medium),
            "complex" => Some(Complexity::Complex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterDecision {
    pub action: RouteAction,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default)]
    pub required_tools: Vec<String>,
    #[serde(default)]
    pub fallback: bool,
}

impl RouterDecision {
    /// Safe default: plain chat. Never code, never a tool.
    pub fn fallback(reason: &str) -> Self {
        Self {
            action: RouteAction::Chat,
            reasoning: format!("Defaulted to chat: {}", reason),
            tool_name: None,
            suggested_description: None,
            complexity: None,
            required_tools: Vec::new(),
            fallback: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based position in the plan
    #[serde(alias = "index")]
    pub step: usize,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_criteria: Option<String>,
}

impl PlanStep {
    pub fn new(step: usize, action: impl Into<String>) -> Self {
        Self {
            step,
            action: action.into(),
            tool: None,
            inputs: Map::new(),
            expected_output: None,
            success_criteria: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerOutput {
    pub plan: Vec<PlanStep>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub mitigations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
    #[serde(default)]
    pub fallback: bool,
}

impl PlannerOutput {
    /// One-step plan that hands the raw request to the Executor.
    pub fn fallback(user_input: &str) -> Self {
        let mut step = PlanStep::new(1, "Process user request directly");
        step.inputs
            .insert("request".to_string(), Value::String(user_input.to_string()));
        step.expected_output = Some("A direct answer to the request".to_string());
        step.success_criteria = Some("The request is answered".to_string());

        Self {
            plan: vec![step],
            risks: vec!["No detailed plan was produced".to_string()],
            mitigations: vec!["Answer the request directly and validate the result".to_string()],
            estimated_duration: Some("short".to_string()),
            fallback: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Partial,
    Failure,
}

impl StepStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "success" => Some(StepStatus::Success),
            "partial" => Some(StepStatus::Partial),
            "failure" | "failed" => Some(StepStatus::Failure),
            _ => None,
        }
    }

    fn severity(&self) -> u8 {
        match self {
            StepStatus::Success => 0,
            StepStatus::Partial => 1,
            StepStatus::Failure => 2,
        }
    }

    /// Overall status with precedence failure > partial > success.
    /// An empty sequence aggregates to success.
    pub fn aggregate<'a>(statuses: impl IntoIterator<Item = &'a StepStatus>) -> StepStatus {
        statuses
            .into_iter()
            .copied()
            .max_by_key(StepStatus::severity)
            .unwrap_or(StepStatus::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Partial => "partial",
            StepStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedStep {
    #[serde(flatten)]
    pub planned: PlanStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutedStep {
    pub fn succeeded(planned: PlanStep, result: String) -> Self {
        let evidence = Some(format!("Completed: {}", planned.action));
        Self {
            planned,
            result: Some(result),
            status: StepStatus::Success,
            evidence,
            error: None,
        }
    }

    pub fn failed(planned: PlanStep, error: String) -> Self {
        Self {
            planned,
            result: None,
            status: StepStatus::Failure,
            evidence: None,
            error: Some(error),
        }
    }

    /// Non-empty result of a successful step
    pub fn usable_result(&self) -> Option<&str> {
        match (&self.status, &self.result) {
            (StepStatus::Success, Some(result)) if !result.trim().is_empty() => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorOutput {
    pub executed_steps: Vec<ExecutedStep>,
    pub overall_status: StepStatus,
    pub summary: String,
    /// The plan was a fallback, so the raw request was executed directly
    #[serde(default)]
    pub direct: bool,
    #[serde(default)]
    pub fallback: bool,
}

impl ExecutorOutput {
    pub fn from_steps(executed_steps: Vec<ExecutedStep>, direct: bool) -> Self {
        let overall_status = StepStatus::aggregate(executed_steps.iter().map(|s| &s.status));
        let summary = summarize(&executed_steps, overall_status);
        Self {
            executed_steps,
            overall_status,
            summary,
            direct,
            fallback: false,
        }
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.executed_steps
            .iter()
            .filter(|s| s.status == status)
            .count()
    }
}

fn summarize(steps: &[ExecutedStep], overall: StepStatus) -> String {
    let count = |status: StepStatus| steps.iter().filter(|s| s.status == status).count();
    format!(
        "Executed {} steps. Successful: {}, Partial: {}, Failed: {}. Overall status: {}",
        steps.len(),
        count(StepStatus::Success),
        count(StepStatus::Partial),
        count(StepStatus::Failure),
        overall
    )
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Passed,
    Failed,
    Partial,
}

impl ValidationStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "passed" => Some(ValidationStatus::Passed),
            "failed" => Some(ValidationStatus::Failed),
            "partial" => Some(ValidationStatus::Partial),
            _ => None,
        }
    }
}

pub const UNABLE_TO_GENERATE: &str = "Unable to generate output for this request.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorOutput {
    pub validation_status: ValidationStatus,
    pub quality_score: u8,
    #[serde(default)]
    pub criteria_met: Vec<String>,
    #[serde(default)]
    pub criteria_failed: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub final_output: String,
    #[serde(default)]
    pub fallback: bool,
}

impl ValidatorOutput {
    /// Heuristic verdict built from the Executor's evidence alone.
    ///
    /// The answer is the most recent successful step's result, else the
    /// executor summary, else a fixed apology.
    pub fn fallback(executor: Option<&ExecutorOutput>, reason: &str) -> Self {
        let executor_ok = executor.map(|e| e.overall_status) == Some(StepStatus::Success);

        let final_output = executor
            .and_then(|e| e.executed_steps.iter().rev().find_map(ExecutedStep::usable_result))
            .map(str::to_string)
            .or_else(|| {
                executor
                    .map(|e| e.summary.clone())
                    .filter(|s| !s.trim().is_empty())
            })
            .unwrap_or_else(|| UNABLE_TO_GENERATE.to_string());

        let (validation_status, quality_score) = if executor_ok {
            (ValidationStatus::Partial, 70)
        } else {
            (ValidationStatus::Failed, 30)
        };

        Self {
            validation_status,
            quality_score,
            criteria_met: Vec::new(),
            criteria_failed: Vec::new(),
            issues: vec![format!("Validation could not be completed: {}", reason)],
            recommendations: vec!["Review the execution results manually".to_string()],
            final_output,
            fallback: true,
        }
    }
}

// ---------------------------------------------------------------------------
// State container
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub run_id: String,
    user_input: String,
    #[serde(skip)]
    history: Vec<ChatMessage>,
    pub available_tools: Vec<String>,
    pub mode: PipelineMode,

    pub router: Option<RouterDecision>,
    pub planner: Option<PlannerOutput>,
    pub executor: Option<ExecutorOutput>,
    pub validator: Option<ValidatorOutput>,

    execution_history: Vec<StageName>,
    errors: Vec<String>,
    step_cursor: usize,

    pub final_output: Option<String>,
    status: PipelineStatus,
}

impl PipelineState {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            user_input: user_input.into(),
            history: Vec::new(),
            available_tools: Vec::new(),
            mode: PipelineMode::default(),
            router: None,
            planner: None,
            executor: None,
            validator: None,
            execution_history: Vec::new(),
            errors: Vec::new(),
            step_cursor: 0,
            final_output: None,
            status: PipelineStatus::Pending,
        }
    }

    /// Prior conversation turns, oldest first
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.available_tools = tools;
        self
    }

    pub fn with_mode(mut self, mode: PipelineMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn execution_history(&self) -> &[StageName] {
        &self.execution_history
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn step_cursor(&self) -> usize {
        self.step_cursor
    }

    pub fn record_stage(&mut self, stage: StageName) {
        self.execution_history.push(stage);
    }

    pub fn push_error(&mut self, stage: StageName, message: impl AsRef<str>) {
        self.errors.push(format!("[{}] {}", stage, message.as_ref()));
    }

    /// Errors not tied to a single stage (fatal controller errors)
    pub fn push_pipeline_error(&mut self, message: impl AsRef<str>) {
        self.errors.push(format!("[pipeline] {}", message.as_ref()));
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a status transition; ignored once the run is terminal.
    /// Returns whether the transition took effect.
    pub fn set_status(&mut self, status: PipelineStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }

    pub fn mark_in_progress(&mut self) -> bool {
        self.set_status(PipelineStatus::InProgress)
    }

    pub fn mark_completed(&mut self) -> bool {
        self.set_status(PipelineStatus::Completed)
    }

    pub fn mark_failed(&mut self) -> bool {
        self.set_status(PipelineStatus::Failed)
    }

    pub fn plan(&self) -> &[PlanStep] {
        self.planner.as_ref().map(|p| p.plan.as_slice()).unwrap_or(&[])
    }

    pub fn current_step(&self) -> Option<&PlanStep> {
        self.plan().get(self.step_cursor)
    }

    pub fn plan_is_fallback(&self) -> bool {
        self.planner.as_ref().map(|p| p.fallback).unwrap_or(true)
    }

    /// Moves the cursor one step forward, never past the end of the plan.
    pub fn advance_cursor(&mut self) -> bool {
        if self.step_cursor < self.plan().len() {
            self.step_cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn steps_remaining(&self) -> bool {
        self.step_cursor < self.plan().len()
    }

    /// Stages whose recorded output is a deterministic substitute
    pub fn fallback_stages(&self) -> Vec<StageName> {
        StageName::ALL
            .into_iter()
            .filter(|stage| self.stage_used_fallback(*stage))
            .collect()
    }

    fn stage_used_fallback(&self, stage: StageName) -> bool {
        match stage {
            StageName::Router => self.router.as_ref().is_some_and(|o| o.fallback),
            StageName::Planner => self.planner.as_ref().is_some_and(|o| o.fallback),
            StageName::Executor => self.executor.as_ref().is_some_and(|o| o.fallback),
            StageName::Validator => self.validator.as_ref().is_some_and(|o| o.fallback),
        }
    }

    pub fn has_output(&self, stage: StageName) -> bool {
        match stage {
            StageName::Router => self.router.is_some(),
            StageName::Planner => self.planner.is_some(),
            StageName::Executor => self.executor.is_some(),
            StageName::Validator => self.validator.is_some(),
        }
    }

    /// JSON form of a stage's output slot, `Null` when unset
    pub fn output_json(&self, stage: StageName) -> Value {
        let value = match stage {
            StageName::Router => serde_json::to_value(&self.router),
            StageName::Planner => serde_json::to_value(&self.planner),
            StageName::Executor => serde_json::to_value(&self.executor),
            StageName::Validator => serde_json::to_value(&self.validator),
        };
        value.unwrap_or(Value::Null)
    }
}
