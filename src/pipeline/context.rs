//! Long-lived dependencies shared by every stage

use std::sync::Arc;

use crate::llm::LLMClient;
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};

use super::config::PipelineConfig;
use super::exchange_log::ExchangeLog;

/// Read-only after construction, so one context can back many runs.
pub struct PipelineContext {
    pub llm_client: Arc<dyn LLMClient>,
    pub config: PipelineConfig,
    pub progress: Arc<dyn ProgressHandler>,
    pub exchange_log: Option<Arc<ExchangeLog>>,
}

impl PipelineContext {
    pub fn new(llm_client: Arc<dyn LLMClient>, config: PipelineConfig) -> Self {
        Self {
            llm_client,
            config,
            progress: Arc::new(NoOpHandler),
            exchange_log: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_exchange_log(mut self, log: Option<ExchangeLog>) -> Self {
        self.exchange_log = log.map(Arc::new);
        self
    }

    pub fn emit(&self, event: ProgressEvent) {
        self.progress.on_progress(&event);
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("llm_client", &self.llm_client.name())
            .field("config", &self.config)
            .field("exchange_log", &self.exchange_log)
            .finish()
    }
}
