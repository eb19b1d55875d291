//! Per-turn front door
//!
//! [`Assistant::handle`] runs one request through the pipeline, then acts on
//! the Router's decision: a chat answer is returned as written by the
//! Validator, a tool is dispatched through the [`ToolRegistry`], and code is
//! generated, confirmed and run in the sandbox. Every turn is recorded in the
//! session store when one is attached.

use crate::llm::{BackendError, LLMRequest};
use crate::pipeline::stages::prompts;
use crate::pipeline::{
    extract_code_block, PipelineContext, PipelineController, PipelineState, PipelineStatus,
    RouteAction, UNABLE_TO_GENERATE,
};
use crate::sandbox::{CodeSandbox, ConfirmationGate, SandboxResult};
use crate::session::SessionStore;
use crate::tools::{ToolOutcome, ToolRegistry};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Answer { text: String },
    ToolResult(ToolOutcome),
    CodeRun { code: String, result: SandboxResult },
    CodeDeclined { code: String },
    /// The run ended FAILED; no answer is produced
    OperationalFailure { errors: Vec<String> },
}

impl Reply {
    /// Label recorded with the turn in the session store
    pub fn responder(&self) -> &'static str {
        match self {
            Reply::Answer { .. } => "chat",
            Reply::ToolResult(_) => "tool",
            Reply::CodeRun { .. } | Reply::CodeDeclined { .. } => "code",
            Reply::OperationalFailure { .. } => "failure",
        }
    }

    pub fn text(&self) -> String {
        match self {
            Reply::Answer { text } => text.clone(),
            Reply::ToolResult(outcome) => outcome.output.clone(),
            Reply::CodeRun { result, .. } => result.render(),
            Reply::CodeDeclined { .. } => "Code execution was declined.".to_string(),
            Reply::OperationalFailure { errors } => match errors.last() {
                Some(last) => format!("The request could not be completed: {}", last),
                None => "The request could not be completed.".to_string(),
            },
        }
    }
}

/// One handled request: the reply plus the finished pipeline state.
#[derive(Debug)]
pub struct Turn {
    pub reply: Reply,
    pub state: PipelineState,
}

pub struct Assistant {
    ctx: Arc<PipelineContext>,
    controller: PipelineController,
    tools: ToolRegistry,
    sandbox: Arc<dyn CodeSandbox>,
    gate: Arc<dyn ConfirmationGate>,
    session: Option<SessionStore>,
    history_turns: usize,
}

impl Assistant {
    pub fn new(
        ctx: Arc<PipelineContext>,
        tools: ToolRegistry,
        sandbox: Arc<dyn CodeSandbox>,
        gate: Arc<dyn ConfirmationGate>,
    ) -> Self {
        Self {
            controller: PipelineController::standard(ctx.clone()),
            ctx,
            tools,
            sandbox,
            gate,
            session: None,
            history_turns: 0,
        }
    }

    /// Replaces the standard controller, e.g. with custom stages.
    pub fn with_controller(mut self, controller: PipelineController) -> Self {
        self.controller = controller;
        self
    }

    /// Attaches a session store; the last `history_turns` turns are sent as
    /// context with each request.
    pub fn with_session(mut self, session: SessionStore, history_turns: usize) -> Self {
        self.session = Some(session);
        self.history_turns = history_turns;
        self
    }

    pub fn session(&self) -> Option<&SessionStore> {
        self.session.as_ref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub async fn handle(&mut self, input: &str) -> Turn {
        let history = self
            .session
            .as_ref()
            .map(|s| s.recent_context(self.history_turns))
            .unwrap_or_default();

        let mut state = PipelineState::new(input)
            .with_history(history)
            .with_tools(self.tools.tool_names())
            .with_mode(self.controller.mode());

        if let Err(e) = self.controller.run(&mut state).await {
            warn!(run_id = %state.run_id, error = %e, "Pipeline run aborted");
        }

        let reply = self.respond(&state).await;
        info!(run_id = %state.run_id, responder = reply.responder(), "Turn handled");

        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.append(input, reply.text(), reply.responder()).await {
                warn!(error = %e, "Failed to record turn");
            }
        }

        Turn { reply, state }
    }

    async fn respond(&self, state: &PipelineState) -> Reply {
        if state.status() == PipelineStatus::Failed {
            return Reply::OperationalFailure {
                errors: state.errors().to_vec(),
            };
        }

        let final_output = state
            .final_output
            .clone()
            .unwrap_or_else(|| UNABLE_TO_GENERATE.to_string());

        let Some(decision) = state.router.as_ref() else {
            return Reply::Answer { text: final_output };
        };

        match decision.action {
            RouteAction::Chat => Reply::Answer { text: final_output },
            RouteAction::Tool => {
                let name = decision.tool_name.as_deref().unwrap_or_default();
                Reply::ToolResult(self.tools.dispatch(name).await)
            }
            RouteAction::Code => {
                let description = decision
                    .suggested_description
                    .as_deref()
                    .unwrap_or_else(|| state.user_input());
                self.run_code(&final_output, description).await
            }
        }
    }

    async fn run_code(&self, final_output: &str, description: &str) -> Reply {
        let code = match extract_code_block(final_output) {
            Some(block) => block.code,
            None => match self.generate_code(description).await {
                Ok(code) => code,
                Err(e) => {
                    warn!(error = %e, "Code generation failed");
                    return Reply::OperationalFailure {
                        errors: vec![format!("code generation failed: {}", e)],
                    };
                }
            },
        };

        if code.trim().is_empty() {
            return Reply::OperationalFailure {
                errors: vec!["code generation returned no code".to_string()],
            };
        }

        if !self.gate.confirm(&code) {
            info!("Code execution declined");
            return Reply::CodeDeclined { code };
        }

        let result = self.sandbox.run(&code).await;
        Reply::CodeRun { code, result }
    }

    async fn generate_code(&self, description: &str) -> Result<String, BackendError> {
        let request = LLMRequest::from_prompts(
            prompts::system_prompt(prompts::CODE_SYSTEM),
            &[],
            prompts::code_prompt(description),
        )
        .with_temperature(self.ctx.config.temperature)
        .with_max_tokens(self.ctx.config.max_tokens);

        let timeout = self.ctx.config.request_timeout;
        let response = tokio::time::timeout(timeout, self.ctx.llm_client.chat(request))
            .await
            .map_err(|_| BackendError::TimeoutError {
                seconds: timeout.as_secs(),
            })??;

        Ok(crate::pipeline::extract::strip_code_fences(&response.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_labels() {
        let answer = Reply::Answer {
            text: "hi".to_string(),
        };
        assert_eq!(answer.responder(), "chat");
        assert_eq!(answer.text(), "hi");

        let declined = Reply::CodeDeclined {
            code: "print(1)".to_string(),
        };
        assert_eq!(declined.responder(), "code");

        let failure = Reply::OperationalFailure {
            errors: vec!["[pipeline] boom".to_string()],
        };
        assert_eq!(failure.text(), "The request could not be completed: [pipeline] boom");
    }

    #[test]
    fn test_reply_serializes_with_kind_tag() {
        let value = serde_json::to_value(Reply::CodeDeclined {
            code: "x".to_string(),
        })
        .unwrap();
        assert_eq!(value["kind"], "code_declined");
    }
}
