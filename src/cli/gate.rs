use crate::sandbox::ConfirmationGate;
use std::io::{self, BufRead, Write};

/// Asks on the terminal before a generated program runs.
///
/// Declines without asking when stdin is not a terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalGate;

impl TerminalGate {
    fn is_yes(answer: &str) -> bool {
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

impl ConfirmationGate for TerminalGate {
    fn confirm(&self, code: &str) -> bool {
        if !atty::is(atty::Stream::Stdin) {
            return false;
        }

        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "\nGenerated program:\n{}\n", code);
        let _ = write!(stderr, "Run this program? [y/N] ");
        let _ = stderr.flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => Self::is_yes(&answer),
            Err(_) => false,
        }
    }
}
