pub mod llm_helper;
pub mod prompts;

#[path = "01_router.rs"]
pub mod router;
#[path = "02_planner.rs"]
pub mod planner;
#[path = "03_executor.rs"]
pub mod executor;
#[path = "04_validator.rs"]
pub mod validator;

pub use executor::ExecutorStage;
pub use planner::PlannerStage;
pub use router::RouterStage;
pub use validator::ValidatorStage;
