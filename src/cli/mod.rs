pub mod commands;
pub mod gate;
pub mod handlers;
pub mod output;

pub use commands::{AskArgs, CliArgs, Commands, ConfigArgs, OutputFormatArg};
pub use gate::TerminalGate;
pub use handlers::{handle_ask, handle_config};
pub use output::{OutputFormat, OutputFormatter, TurnReport};
