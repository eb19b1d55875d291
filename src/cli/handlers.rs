use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error};

use super::commands::{AskArgs, ConfigArgs};
use super::gate::TerminalGate;
use super::output::OutputFormatter;
use crate::assistant::{Assistant, Reply};
use crate::config::StagehandConfig;
use crate::llm::create_client;
use crate::pipeline::{ExchangeLog, PipelineContext};
use crate::progress::LoggingHandler;
use crate::sandbox::PythonSandbox;
use crate::session::SessionStore;
use crate::tools::ToolRegistry;

/// Applies `ask` flags on top of the environment-derived configuration.
pub fn resolve_config(args: &AskArgs) -> StagehandConfig {
    let mut config = StagehandConfig::default();
    if let Some(provider) = &args.provider {
        config.provider = provider.trim().to_lowercase();
    }
    if let Some(model) = &args.model {
        config.model = Some(model.clone());
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_secs = timeout;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    config
}

pub async fn handle_ask(args: &AskArgs) -> i32 {
    match run_ask(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

async fn run_ask(args: &AskArgs) -> Result<i32> {
    let config = resolve_config(args);
    config.validate().context("Invalid configuration")?;
    debug!("{}", config);

    let selected = create_client(&config)?;
    debug!(client = %selected.description, "Reasoning client ready");

    let ctx = PipelineContext::new(selected.client, config.pipeline_config())
        .with_progress(Arc::new(LoggingHandler))
        .with_exchange_log(
            config
                .exchange_log
                .as_ref()
                .and_then(|path| ExchangeLog::open(path)),
        );

    let tools = ToolRegistry::with_defaults().context("Failed to set up tools")?;
    let sandbox = PythonSandbox::new(
        config.sandbox_dir.clone(),
        config.python.clone(),
        config.sandbox_timeout(),
    );

    let mut assistant = Assistant::new(
        Arc::new(ctx),
        tools,
        Arc::new(sandbox),
        Arc::new(TerminalGate),
    );
    if !args.no_session {
        assistant = assistant.with_session(
            SessionStore::load(config.session_file.clone()).await,
            config.history_turns,
        );
    }

    let turn = assistant.handle(&args.request_text()).await;

    let formatter = OutputFormatter::new(args.format.into());
    let output = formatter.format_turn(&turn)?;
    println!("{}", output);

    Ok(match turn.reply {
        Reply::OperationalFailure { .. } => 1,
        _ => 0,
    })
}

pub fn handle_config(args: &ConfigArgs) -> i32 {
    let config = StagehandConfig::default();
    let formatter = OutputFormatter::new(args.format.into());

    match formatter.format_config(&config) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return 1;
        }
    }

    match config.validate() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Configuration is invalid: {}", e);
            2
        }
    }
}
