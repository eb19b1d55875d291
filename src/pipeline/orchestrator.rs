use super::context::PipelineContext;
use super::stage_trait::Stage;
use super::stages::{ExecutorStage, PlannerStage, RouterStage, ValidatorStage};
use super::state::{PipelineMode, PipelineState, StageName};
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};

/// Fatal controller errors. Stage-level failures never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("pipeline is missing stages: {}", format_stages(.0))]
    MissingStages(Vec<StageName>),

    #[error("iteration did not advance past step {cursor} of {plan_len}")]
    NonAdvancingLoop { cursor: usize, plan_len: usize },
}

fn format_stages(stages: &[StageName]) -> String {
    stages
        .iter()
        .map(StageName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Drives one state through the four stages.
pub struct PipelineController {
    router: Option<Box<dyn Stage>>,
    planner: Option<Box<dyn Stage>>,
    executor: Option<Box<dyn Stage>>,
    validator: Option<Box<dyn Stage>>,
    mode: PipelineMode,
    progress: Arc<dyn ProgressHandler>,
}

impl PipelineController {
    /// A controller with no stages registered.
    pub fn new(mode: PipelineMode, progress: Arc<dyn ProgressHandler>) -> Self {
        Self {
            router: None,
            planner: None,
            executor: None,
            validator: None,
            mode,
            progress,
        }
    }

    /// The standard four stages sharing one context.
    pub fn standard(ctx: Arc<PipelineContext>) -> Self {
        Self::new(ctx.config.mode, ctx.progress.clone())
            .with_stage(Box::new(RouterStage::new(ctx.clone())))
            .with_stage(Box::new(PlannerStage::new(ctx.clone())))
            .with_stage(Box::new(ExecutorStage::new(ctx.clone())))
            .with_stage(Box::new(ValidatorStage::new(ctx)))
    }

    /// Registers a stage in the slot named by [`Stage::name`], replacing
    /// whatever was there.
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        let slot = match stage.name() {
            StageName::Router => &mut self.router,
            StageName::Planner => &mut self.planner,
            StageName::Executor => &mut self.executor,
            StageName::Validator => &mut self.validator,
        };
        *slot = Some(stage);
        self
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    fn stage(&self, name: StageName) -> Option<&dyn Stage> {
        let slot = match name {
            StageName::Router => &self.router,
            StageName::Planner => &self.planner,
            StageName::Executor => &self.executor,
            StageName::Validator => &self.validator,
        };
        slot.as_deref()
    }

    fn missing_stages(&self) -> Vec<StageName> {
        StageName::ALL
            .into_iter()
            .filter(|name| self.stage(*name).is_none())
            .collect()
    }

    /// Runs the state to a terminal status.
    ///
    /// Returns `Err` only for controller-level faults; the state is then
    /// `FAILED` and carries a `[pipeline]` error. A stage that marks the run
    /// failed ends it early with `Ok(())`.
    pub async fn run(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        if state.is_terminal() {
            debug!(run_id = %state.run_id, status = %state.status(), "State already terminal");
            return Ok(());
        }

        let start = Instant::now();
        state.mode = self.mode;
        state.mark_in_progress();
        info!(run_id = %state.run_id, mode = %self.mode, "Starting pipeline run");
        self.progress.on_progress(&ProgressEvent::Started {
            run_id: state.run_id.clone(),
            mode: self.mode,
        });

        let missing = self.missing_stages();
        if !missing.is_empty() {
            return Err(self.fail(state, PipelineError::MissingStages(missing)));
        }

        match self.mode {
            PipelineMode::Linear => self.run_linear(state).await,
            PipelineMode::Iterative => self.run_iterative(state).await?,
        }

        if state.mark_completed() {
            info!(
                run_id = %state.run_id,
                stages_run = state.execution_history().len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Pipeline run completed"
            );
            self.progress.on_progress(&ProgressEvent::Completed {
                stages_run: state.execution_history().len(),
                total_time: start.elapsed(),
            });
        } else {
            let reason = state
                .errors()
                .last()
                .cloned()
                .unwrap_or_else(|| "run ended by a stage".to_string());
            info!(run_id = %state.run_id, reason = %reason, "Pipeline run failed");
            self.progress
                .on_progress(&ProgressEvent::Failed { error: reason });
        }

        Ok(())
    }

    async fn run_linear(&self, state: &mut PipelineState) {
        for name in StageName::ALL {
            if state.is_terminal() {
                break;
            }
            self.run_stage(name, state).await;
        }
    }

    async fn run_iterative(&self, state: &mut PipelineState) -> Result<(), PipelineError> {
        if state.planner.is_none() {
            self.run_stage(StageName::Router, state).await;
            self.run_stage(StageName::Planner, state).await;
        } else {
            debug!(run_id = %state.run_id, "Plan present, resuming at step {}", state.step_cursor());
        }

        while state.steps_remaining() && !state.is_terminal() {
            let before = state.step_cursor();
            self.run_stage(StageName::Executor, state).await;
            self.run_stage(StageName::Validator, state).await;

            if state.is_terminal() {
                break;
            }

            let plan_len = state.plan().len();
            if state.step_cursor() <= before {
                return Err(self.fail(
                    state,
                    PipelineError::NonAdvancingLoop {
                        cursor: before,
                        plan_len,
                    },
                ));
            }

            self.progress.on_progress(&ProgressEvent::StepAdvanced {
                cursor: state.step_cursor(),
                plan_len,
            });
        }

        Ok(())
    }

    async fn run_stage(&self, name: StageName, state: &mut PipelineState) {
        let Some(stage) = self.stage(name) else {
            return;
        };

        self.progress
            .on_progress(&ProgressEvent::StageStarted { stage: name });
        let stage_start = Instant::now();

        stage.execute(state).await;

        debug!(stage = %name, elapsed_ms = stage_start.elapsed().as_millis() as u64, "Stage complete");
        self.progress.on_progress(&ProgressEvent::StageComplete {
            stage: name,
            output: state.output_json(name),
            duration: stage_start.elapsed(),
        });
    }

    fn fail(&self, state: &mut PipelineState, err: PipelineError) -> PipelineError {
        error!(run_id = %state.run_id, error = %err, "Pipeline run aborted");
        state.push_pipeline_error(err.to_string());
        state.mark_failed();
        self.progress.on_progress(&ProgressEvent::Failed {
            error: err.to_string(),
        });
        err
    }
}

impl Default for PipelineController {
    fn default() -> Self {
        Self::new(PipelineMode::default(), Arc::new(NoOpHandler))
    }
}
