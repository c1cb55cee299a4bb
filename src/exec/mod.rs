//! Host command execution
//!
//! Package, service, ownership and SELinux operations all go through a
//! [`CommandRunner`] so the provisioning routines can run against a
//! recording double in tests.

pub mod recording;

pub use recording::RecordingRunner;

use async_trait::async_trait;
use tracing::debug;

use crate::ProvisionError;

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: &str) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Trait for running external programs
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion
    ///
    /// A non-zero exit is not an error here; only failing to spawn is.
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ProvisionError>;
}

/// Runs commands on the host via `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct HostRunner;

#[async_trait]
impl CommandRunner for HostRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ProvisionError> {
        debug!("Running command: {} {}", program, args.join(" "));

        let output = tokio::process::Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .output()
            .await
            .map_err(|e| ProvisionError::Command(format!("failed to spawn {program}: {e}")))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a command and turn a non-zero exit into an error
pub async fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<CommandOutput, ProvisionError> {
    let output = runner.run(program, args).await?;
    if !output.success() {
        return Err(ProvisionError::command(program, output.code, &output.stderr));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_checked_passes_success() {
        let runner = RecordingRunner::new();
        let output = run_checked(&runner, "true", &[]).await.unwrap();
        assert!(output.success());
    }

    #[tokio::test]
    async fn test_run_checked_rejects_failure() {
        let runner =
            RecordingRunner::new().with_response("false", CommandOutput::failed(1, "nope"));
        let err = run_checked(&runner, "false", &[]).await.unwrap_err();
        assert!(err.to_string().contains("false exited with 1: nope"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_host_runner_captures_output() {
        let output = HostRunner.run("sh", &["-c", "echo out; echo err >&2; exit 3"]).await.unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_host_runner_missing_program() {
        let result = HostRunner.run("/nonexistent/ec2-bootstrap-tool", &[]).await;
        assert!(matches!(result, Err(ProvisionError::Command(_))));
    }
}
