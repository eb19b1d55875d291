//! Running generated code
//!
//! Generated programs run in a dedicated working directory under a wall-clock
//! limit, and only after a [`ConfirmationGate`] approves them.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info, warn};

pub const SCRIPT_NAME: &str = "script.py";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process never started or was killed
    pub exit_code: Option<i32>,
}

impl SandboxResult {
    fn not_run(stderr: String) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr,
            exit_code: None,
        }
    }

    /// Text shown to the user
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.stdout.trim().is_empty() {
            out.push_str(self.stdout.trim_end());
        }
        if !self.stderr.trim().is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("[stderr] ");
            out.push_str(self.stderr.trim_end());
        }
        if out.is_empty() {
            out = match self.exit_code {
                Some(code) => format!("Program finished with exit code {} and no output", code),
                None => "Program produced no output".to_string(),
            };
        }
        out
    }
}

#[async_trait]
pub trait CodeSandbox: Send + Sync {
    async fn run(&self, code: &str) -> SandboxResult;
}

/// Decides whether a generated program may run.
pub trait ConfirmationGate: Send + Sync {
    fn confirm(&self, code: &str) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl ConfirmationGate for DenyAll {
    fn confirm(&self, _code: &str) -> bool {
        false
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ApproveAll;

impl ConfirmationGate for ApproveAll {
    fn confirm(&self, _code: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct PythonSandbox {
    dir: PathBuf,
    interpreter: String,
    timeout: Duration,
}

impl PythonSandbox {
    pub fn new(dir: impl Into<PathBuf>, interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            interpreter: interpreter.into(),
            timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn script_path(&self) -> PathBuf {
        self.dir.join(SCRIPT_NAME)
    }
}

#[async_trait]
impl CodeSandbox for PythonSandbox {
    async fn run(&self, code: &str) -> SandboxResult {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            error!(dir = %self.dir.display(), error = %e, "Cannot create sandbox directory");
            return SandboxResult::not_run(format!(
                "Failed to create sandbox directory {}: {}",
                self.dir.display(),
                e
            ));
        }

        let script = self.script_path();
        if let Err(e) = tokio::fs::write(&script, code).await {
            error!(script = %script.display(), error = %e, "Cannot write script");
            return SandboxResult::not_run(format!("Failed to write {}: {}", script.display(), e));
        }

        info!(interpreter = %self.interpreter, script = %script.display(), "Running generated program");

        let child = Command::new(&self.interpreter)
            .arg(SCRIPT_NAME)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(interpreter = %self.interpreter, error = %e, "Failed to start interpreter");
                return SandboxResult::not_run(format!(
                    "Failed to start '{}': {}",
                    self.interpreter, e
                ));
            }
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => SandboxResult {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code(),
            },
            Ok(Err(e)) => SandboxResult::not_run(format!("Failed to collect program output: {}", e)),
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs_f64(), "Generated program timed out");
                SandboxResult::not_run(format!(
                    "Execution timed out ({}s limit)",
                    self.timeout.as_secs()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_gates() {
        assert!(!DenyAll.confirm("print(1)"));
        assert!(ApproveAll.confirm("print(1)"));
    }

    #[test]
    fn test_render_combines_streams() {
        let result = SandboxResult {
            success: false,
            stdout: "partial\n".to_string(),
            stderr: "Traceback\n".to_string(),
            exit_code: Some(1),
        };
        assert_eq!(result.render(), "partial\n[stderr] Traceback");

        let silent = SandboxResult {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
        };
        assert_eq!(silent.render(), "Program finished with exit code 0 and no output");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_sandbox_directory() {
        let dir = TempDir::new().unwrap();
        let sandbox = PythonSandbox::new(dir.path().join("box"), "sh", Duration::from_secs(5));

        let result = sandbox.run("echo hello; ls").await;

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.contains("hello"));
        assert!(result.stdout.contains(SCRIPT_NAME));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let dir = TempDir::new().unwrap();
        let sandbox = PythonSandbox::new(dir.path(), "sh", Duration::from_secs(5));

        let result = sandbox.run("echo oops >&2; exit 3").await;

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_reported() {
        let dir = TempDir::new().unwrap();
        let sandbox = PythonSandbox::new(dir.path(), "sh", Duration::from_millis(100));

        let result = sandbox.run("sleep 5").await;

        assert!(!result.success);
        assert!(result.stderr.contains("timed out"));
        assert!(result.exit_code.is_none());
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_reported() {
        let dir = TempDir::new().unwrap();
        let sandbox = PythonSandbox::new(
            dir.path(),
            "stagehand-no-such-interpreter",
            Duration::from_secs(1),
        );

        let result = sandbox.run("print(1)").await;

        assert!(!result.success);
        assert!(result.stderr.starts_with("Failed to start"));
    }
}
