use super::state::PipelineMode;
use std::time::Duration;

/// Stage-level settings, derived once from `StagehandConfig`
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: PipelineMode,
    /// Wall-clock bound on each reasoning call
    pub request_timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Attempts per reasoning call before the fallback is substituted
    pub max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Linear,
            request_timeout: Duration::from_secs(60),
            temperature: 0.7,
            max_tokens: 4000,
            max_attempts: 1,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: PipelineMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Clamped to at least one attempt
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}
