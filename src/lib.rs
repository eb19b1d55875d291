//! stagehand - a staged reasoning assistant
//!
//! Each request passes through four stages that share one
//! [`PipelineState`]: the Router picks a response path (chat, tool or code),
//! the Planner breaks the request into steps, the Executor carries them out,
//! and the Validator judges the evidence and writes the final answer. Every
//! stage talks to a language model through [`LLMClient`] and falls back to a
//! deterministic output when a reply cannot be used, so a run always reaches
//! a terminal status.
//!
//! # Example Usage
//!
//! ```no_run
//! use stagehand::{PipelineConfig, PipelineContext, PipelineController, PipelineState};
//! use stagehand::llm::{MockLLMClient, MockResponse};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let client = Arc::new(MockLLMClient::new());
//! client.add_response(MockResponse::text(r#"{"action": "chat", "reasoning": "greeting"}"#));
//!
//! let ctx = Arc::new(PipelineContext::new(client, PipelineConfig::default()));
//! let controller = PipelineController::standard(ctx);
//!
//! let mut state = PipelineState::new("Hello there");
//! controller.run(&mut state).await.ok();
//! println!("{:?}: {:?}", state.status(), state.final_output);
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`llm`]: reasoning client trait, genai-backed client, mock client
//! - [`pipeline`]: state, stages, controller, structured-output extraction
//! - [`assistant`]: per-turn handling of the routing decision
//! - [`tools`], [`sandbox`], [`session`]: collaborators used by the assistant

pub mod assistant;
pub mod cli;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod sandbox;
pub mod session;
pub mod tools;
pub mod util;

pub use assistant::{Assistant, Reply, Turn};
pub use config::{ConfigError, StagehandConfig};
pub use llm::{BackendError, LLMClient, LLMRequest, LLMResponse};
pub use pipeline::{
    PipelineConfig, PipelineContext, PipelineController, PipelineError, PipelineMode,
    PipelineState, PipelineStatus, Stage, StageName,
};
pub use progress::{ChannelHandler, LoggingHandler, NoOpHandler, ProgressEvent, ProgressHandler};
pub use sandbox::{CodeSandbox, ConfirmationGate, PythonSandbox, SandboxResult};
pub use session::{SessionError, SessionStore};
pub use tools::{Tool, ToolRegistry};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
