//! Output formatting for multiple formats
//!
//! JSON and YAML render a [`TurnReport`], the machine-readable view of one
//! handled request. Human output prints the answer first and a short run
//! summary after it.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::assistant::{Reply, Turn};
use crate::config::StagehandConfig;
use crate::pipeline::{PipelineMode, PipelineStatus, StageName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    Yaml,
    /// Human-readable formatted text
    Human,
}

/// Serializable summary of one turn
#[derive(Debug, Serialize)]
pub struct TurnReport<'a> {
    pub run_id: &'a str,
    pub request: &'a str,
    pub status: PipelineStatus,
    pub mode: PipelineMode,
    pub answer: String,
    pub reply: &'a Reply,
    pub stages_run: Vec<StageName>,
    pub fallback_stages: Vec<StageName>,
    pub errors: &'a [String],
    pub router: Value,
    pub planner: Value,
    pub executor: Value,
    pub validator: Value,
}

impl<'a> TurnReport<'a> {
    pub fn new(turn: &'a Turn) -> Self {
        let state = &turn.state;
        Self {
            run_id: &state.run_id,
            request: state.user_input(),
            status: state.status(),
            mode: state.mode,
            answer: turn.reply.text(),
            reply: &turn.reply,
            stages_run: state.execution_history().to_vec(),
            fallback_stages: state.fallback_stages(),
            errors: state.errors(),
            router: state.output_json(StageName::Router),
            planner: state.output_json(StageName::Planner),
            executor: state.output_json(StageName::Executor),
            validator: state.output_json(StageName::Validator),
        }
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_turn(&self, turn: &Turn) -> Result<String> {
        let report = TurnReport::new(turn);
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&report).context("Failed to serialize turn to JSON")
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(&report).context("Failed to serialize turn to YAML")
            }
            OutputFormat::Human => Ok(self.format_turn_human(turn, &report)),
        }
    }

    pub fn format_config(&self, config: &StagehandConfig) -> Result<String> {
        let config_map = config.to_display_map();
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&config_map)
                .context("Failed to serialize config to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(&config_map).context("Failed to serialize config to YAML")
            }
            OutputFormat::Human => Ok(config.to_string()),
        }
    }

    fn format_turn_human(&self, turn: &Turn, report: &TurnReport<'_>) -> String {
        let mut output = String::new();

        match &turn.reply {
            Reply::ToolResult(outcome) => {
                output.push_str(&format!("[tool: {}]\n", outcome.tool));
            }
            Reply::CodeRun { code, result } => {
                output.push_str("Program:\n");
                output.push_str(&indent(code));
                output.push_str(&format!(
                    "\n\nResult ({}):\n",
                    if result.success { "ok" } else { "failed" }
                ));
            }
            Reply::CodeDeclined { code } => {
                output.push_str("Program (not run):\n");
                output.push_str(&indent(code));
                output.push_str("\n\n");
            }
            Reply::Answer { .. } | Reply::OperationalFailure { .. } => {}
        }
        output.push_str(&report.answer);
        output.push_str("\n\n");

        let stages = report
            .stages_run
            .iter()
            .map(StageName::as_str)
            .collect::<Vec<_>>()
            .join(" -> ");
        output.push_str(&format!(
            "── {} · {} · {} ──\n",
            report.status, report.mode, stages
        ));

        if let Some(verdict) = &turn.state.validator {
            output.push_str(&format!(
                "Quality: {}/100 ({:?})\n",
                verdict.quality_score, verdict.validation_status
            ));
        }
        if !report.fallback_stages.is_empty() {
            let names: Vec<&str> = report.fallback_stages.iter().map(StageName::as_str).collect();
            output.push_str(&format!("Fallback used: {}\n", names.join(", ")));
        }
        if !report.errors.is_empty() {
            output.push_str(&format!("Errors ({}):\n", report.errors.len()));
            for error in report.errors {
                output.push_str(&format!("  - {}\n", error));
            }
        }

        output
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
