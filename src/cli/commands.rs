use crate::pipeline::PipelineMode;
use clap::{Parser, Subcommand, ValueEnum};

/// Staged reasoning assistant: route, plan, execute, validate
#[derive(Parser, Debug)]
#[command(
    name = "stagehand",
    about = "Staged reasoning assistant: route, plan, execute, validate",
    version,
    author,
    long_about = "stagehand answers a request by running it through four reasoning stages \
                  (router, planner, executor, validator) backed by a language model. \
                  Depending on the routing decision the answer is a chat reply, the output \
                  of a built-in tool, or a generated Python program run after confirmation."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Verbose logging (debug level)"
    )]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Answer a request",
        long_about = "Runs the request through the reasoning pipeline and acts on the routing \
                      decision.\n\n\
                      Examples:\n  \
                      stagehand ask \"What is a monad?\"\n  \
                      stagehand ask \"Sum the primes below 1000\" --mode iterative\n  \
                      stagehand ask \"Any FPL news?\" --format json\n  \
                      stagehand ask \"Hi\" --provider openai --model gpt-4o-mini"
    )]
    Ask(AskArgs),

    #[command(
        about = "Show the effective configuration",
        long_about = "Prints the configuration resolved from STAGEHAND_* environment variables \
                      and validates it.\n\n\
                      Examples:\n  \
                      stagehand config\n  \
                      stagehand config --format yaml"
    )]
    Config(ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct AskArgs {
    #[arg(value_name = "REQUEST", required = true, num_args = 1.., help = "The request to answer")]
    pub request: Vec<String>,

    #[arg(long, value_parser = parse_mode, help = "Pipeline mode: linear or iterative")]
    pub mode: Option<PipelineMode>,

    #[arg(
        short = 'p',
        long,
        value_name = "PROVIDER",
        help = "Reasoning provider (ollama, openai, anthropic, gemini, groq, xai, deepseek, kimi)"
    )]
    pub provider: Option<String>,

    #[arg(
        short = 'm',
        long,
        value_name = "MODEL",
        help = "Model name to use (provider-specific)"
    )]
    pub model: Option<String>,

    #[arg(long, value_name = "SECONDS", help = "Per-request timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(long, help = "Neither read nor record session history")]
    pub no_session: bool,
}

impl AskArgs {
    pub fn request_text(&self) -> String {
        self.request.join(" ")
    }
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_mode(s: &str) -> Result<PipelineMode, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_ask_args() {
        let args = CliArgs::parse_from(["stagehand", "ask", "what", "is", "rust?"]);
        match args.command {
            Commands::Ask(ask) => {
                assert_eq!(ask.request_text(), "what is rust?");
                assert_eq!(ask.format, OutputFormatArg::Human);
                assert!(ask.mode.is_none());
                assert!(ask.provider.is_none());
                assert!(ask.timeout.is_none());
                assert!(!ask.no_session);
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_ask_with_options() {
        let args = CliArgs::parse_from([
            "stagehand",
            "ask",
            "hi",
            "--mode",
            "iterative",
            "--provider",
            "groq",
            "--timeout",
            "15",
            "--format",
            "json",
            "--no-session",
        ]);
        match args.command {
            Commands::Ask(ask) => {
                assert_eq!(ask.mode, Some(PipelineMode::Iterative));
                assert_eq!(ask.provider.as_deref(), Some("groq"));
                assert_eq!(ask.timeout, Some(15));
                assert_eq!(ask.format, OutputFormatArg::Json);
                assert!(ask.no_session);
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let result = CliArgs::try_parse_from(["stagehand", "ask", "hi", "--mode", "sideways"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_ask_requires_request() {
        assert!(CliArgs::try_parse_from(["stagehand", "ask"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["stagehand", "--log-level", "debug", "config"]);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(matches!(args.command, Commands::Config(_)));

        assert!(CliArgs::try_parse_from(["stagehand", "-v", "-q", "config"]).is_err());
    }
}
