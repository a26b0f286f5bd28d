//! Terminal command runner.
//!
//! Runs a single admitted command as a child process with a hard timeout.
//! Commands are executed directly (program + arguments), never through a
//! shell, so nothing but the admitted program can run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::command::{Admission, CommandPolicy};
use crate::error::{Error, Result};

/// Captured result of a finished command.
///
/// `error` is set when the command wrote anything to stderr, in which case
/// `output` carries stderr instead of stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub output: String,
    pub error: bool,
}

/// Policy-gated command executor
#[derive(Debug, Clone)]
pub struct CommandRunner {
    policy: CommandPolicy,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(CommandPolicy::default())
    }
}

impl CommandRunner {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(policy: CommandPolicy) -> Self {
        Self {
            policy,
            timeout: Self::DEFAULT_TIMEOUT,
            working_dir: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn policy(&self) -> &CommandPolicy {
        &self.policy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check a command against the policy without running it.
    pub fn admit(&self, raw: &str) -> Result<()> {
        let command = raw.trim();
        if command.is_empty() {
            return Err(Error::EmptyCommand);
        }

        match self.policy.evaluate(raw) {
            Admission::Allowed { .. } => Ok(()),
            Admission::Denied(reason) => Err(Error::CommandDenied {
                command: command.to_string(),
                reason,
            }),
        }
    }

    /// Admit and execute a command, waiting at most the configured timeout.
    pub async fn run(&self, raw: &str) -> Result<CommandOutput> {
        self.admit(raw)?;

        let command = raw.trim();
        let mut parts = command.split_whitespace();
        let program = parts.next().ok_or(Error::EmptyCommand)?;

        let executable =
            which::which(program).map_err(|_| Error::ExecutableNotFound(program.to_string()))?;
        debug!("Running {:?} (resolved from '{}')", executable, program);

        let mut cmd = Command::new(executable);
        cmd.args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| Error::spawn_failed(command, e))?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::CommandTimeout {
                    command: command.to_string(),
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !stderr.is_empty() {
            return Ok(CommandOutput {
                output: stderr,
                error: true,
            });
        }

        Ok(CommandOutput {
            output: stdout,
            error: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Denial;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_run_allowed_command() {
        let runner = CommandRunner::default();
        let out = runner.run("echo hello deck").await.unwrap();
        assert_eq!(out.output.trim(), "hello deck");
        assert!(!out.error);
    }

    #[tokio::test]
    async fn test_run_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();

        let runner = CommandRunner::default().with_working_dir(dir.path());
        let out = runner.run("ls -la").await.unwrap();
        assert!(out.output.contains("marker.txt"));
        assert!(!out.error);
    }

    #[tokio::test]
    async fn test_denied_command_is_not_spawned() {
        let runner = CommandRunner::default();
        match runner.run("rm -rf /").await {
            Err(Error::CommandDenied { command, reason }) => {
                assert_eq!(command, "rm -rf /");
                assert_eq!(reason, Denial::Forbidden("rm".into()));
            }
            other => panic!("expected denial, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_command() {
        let runner = CommandRunner::default();
        assert!(matches!(runner.run("   ").await, Err(Error::EmptyCommand)));
    }

    #[tokio::test]
    async fn test_stderr_marks_error() {
        let runner = CommandRunner::default();
        let out = runner.run("ls /definitely/not/a/real/path").await.unwrap();
        assert!(out.error);
        assert!(!out.output.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let runner = CommandRunner::new(CommandPolicy::empty().allow(["sleep"]))
            .with_timeout(Duration::from_millis(200));
        let err = runner.run("sleep 5").await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let runner = CommandRunner::new(CommandPolicy::empty().allow(["deck_no_such_program"]));
        let err = runner.run("deck_no_such_program --help").await.unwrap_err();
        assert!(matches!(err, Error::ExecutableNotFound(p) if p == "deck_no_such_program"));
    }

    #[test]
    fn test_admit() {
        let runner = CommandRunner::default();
        assert_ok!(runner.admit("ps aux"));
        assert_err!(runner.admit("ps aux | grep x"));
        assert_eq!(runner.timeout(), CommandRunner::DEFAULT_TIMEOUT);
    }
}
