//! Local command execution using `tokio::process`

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, instrument};

use crate::error::ExecError;

/// Upper bound for any single package manager query
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of a command execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit status code (-1 if killed by a signal)
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutput {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs shell commands on the agent's machine
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` through `sh -c`
    async fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError>;
}

/// `CommandRunner` backed by `tokio::process`
#[derive(Debug, Clone)]
pub struct LocalRunner {
    timeout: Duration,
}

impl LocalRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn execute(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        let start = Instant::now();

        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecError::SpawnError(e.to_string()))?;

        let duration = start.elapsed();
        let status = output.status.code().unwrap_or(-1);

        debug!(command = %cmd, status, duration = ?duration, "command completed");

        Ok(CommandOutput {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration,
        })
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    #[instrument(skip(self), level = "debug")]
    async fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
        timeout(self.timeout, self.execute(cmd))
            .await
            .map_err(|_| ExecError::Timeout {
                timeout: self.timeout,
            })?
    }
}

/// Whether `tool` is on the runner's `PATH`
pub(crate) async fn has_tool(runner: &dyn CommandRunner, tool: &str) -> bool {
    runner
        .run(&format!("command -v {tool}"))
        .await
        .map(|r| r.success())
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Canned output per command line; anything else exits 127
    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        outputs: HashMap<String, (i32, String)>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub(crate) fn with(mut self, cmd: &str, status: i32, stdout: &str) -> Self {
            self.outputs
                .insert(cmd.to_string(), (status, stdout.to_string()));
            self
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, cmd: &str) -> Result<CommandOutput, ExecError> {
            self.calls.lock().unwrap().push(cmd.to_string());
            let (status, stdout) = self
                .outputs
                .get(cmd)
                .cloned()
                .unwrap_or((127, String::new()));
            Ok(CommandOutput {
                status,
                stdout,
                stderr: String::new(),
                duration: Duration::ZERO,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_both_streams() {
        let output = LocalRunner::new()
            .run("printf 'vim/stable 2 amd64\\n'; echo 'WARNING: unstable CLI' >&2")
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, "vim/stable 2 amd64\n");
        assert_eq!(output.stderr.trim(), "WARNING: unstable CLI");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        // dnf check-update style: 100 means "updates available"
        let output = LocalRunner::new().run("exit 100").await.unwrap();

        assert!(!output.success());
        assert_eq!(output.status, 100);
    }

    #[tokio::test]
    async fn test_slow_command_times_out() {
        let runner = LocalRunner::with_timeout(Duration::from_millis(100));

        let err = runner.run("sleep 5").await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout { timeout } if timeout == Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn test_has_tool() {
        let runner = LocalRunner::new();

        assert!(has_tool(&runner, "sh").await);
        assert!(!has_tool(&runner, "watchpost-no-such-tool").await);
    }
}
