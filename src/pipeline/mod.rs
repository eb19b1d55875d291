pub mod config;
pub mod context;
pub mod exchange_log;
pub mod extract;
pub mod orchestrator;
pub mod stage_trait;
pub mod stages;
pub mod state;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use exchange_log::ExchangeLog;
pub use extract::{extract_code_block, extract_structured, CodeBlock, StructuredOutput};
pub use orchestrator::{PipelineController, PipelineError};
pub use stage_trait::{Stage, Validation};
pub use stages::{ExecutorStage, PlannerStage, RouterStage, ValidatorStage};
pub use state::{
    Complexity, ExecutedStep, ExecutorOutput, PipelineMode, PipelineState, PipelineStatus,
    PlanStep, PlannerOutput, RouteAction, RouterDecision, StageName, StepStatus,
    ValidationStatus, ValidatorOutput, UNABLE_TO_GENERATE,
};
