//! Streamed process execution with a deadline and cancellation.
//!
//! Package manager listings can be tens of megabytes, so standard output is
//! streamed straight into a file inside a per-invocation temporary directory
//! instead of being buffered in memory. The directory lives as long as the
//! returned [`CapturedOutput`] and is removed when it is dropped.

use lockscan_core::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const STDOUT_FILE: &str = "stdout.json";

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Build a command from a program and arguments.
    #[must_use]
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Shell-quoted command line, for logs and error messages.
    #[must_use]
    pub fn display(&self) -> String {
        let words =
            std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| {
            std::iter::once(self.program.clone())
                .chain(self.args.iter().cloned())
                .collect::<Vec<_>>()
                .join(" ")
        })
    }
}

/// Output of a finished process.
#[derive(Debug)]
pub struct CapturedOutput {
    dir: TempDir,
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock run time.
    pub elapsed: Duration,
}

impl CapturedOutput {
    /// Whether the process exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// Path of the file holding standard output.
    #[must_use]
    pub fn stdout_path(&self) -> PathBuf {
        self.dir.path().join(STDOUT_FILE)
    }

    /// Read standard output.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the capture file cannot be read.
    pub fn stdout(&self) -> Result<String> {
        let path = self.stdout_path();
        let bytes =
            std::fs::read(&path).map_err(|e| Error::io(e, Some(&path), "reading command output"))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Runs commands with a wall-clock timeout.
#[derive(Debug, Clone, Copy)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

impl CommandExecutor {
    /// Executor with the given deadline.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The deadline applied to every command.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` in `cwd`.
    ///
    /// A non-zero exit is not an error here: callers decide whether the
    /// captured output is still usable.
    ///
    /// # Errors
    ///
    /// - [`Error::ProcessFailure`] when the program cannot be started
    /// - [`Error::ProcessTimeout`] when the deadline passes (the child is killed)
    /// - [`Error::Cancelled`] when the token fires (the child is killed)
    #[tracing::instrument(
        name = "exec",
        skip_all,
        fields(command = %command.display(), cwd = %cwd.display())
    )]
    pub async fn run(
        &self,
        command: &CommandSpec,
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<CapturedOutput> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let dir = tempfile::Builder::new()
            .prefix("lockscan-")
            .tempdir()
            .map_err(|e| Error::io(e, None, "creating output directory"))?;
        let stdout_path = dir.path().join(STDOUT_FILE);
        let stdout_file = File::create(&stdout_path)
            .map_err(|e| Error::io(e, Some(&stdout_path), "creating output file"))?;

        let start = Instant::now();
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ProcessFailure {
                command: command.display(),
                exit_code: None,
                stderr: format!("failed to start: {e}"),
            })?;

        let stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe
                && let Err(e) = pipe.read_to_end(&mut buf).await
            {
                debug!("Failed to read stderr: {e}");
            }
            buf
        });

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            () = tokio::time::sleep(self.timeout) => Outcome::TimedOut,
            () = cancel.cancelled() => Outcome::Cancelled,
        };

        let status = match outcome {
            Outcome::Exited(status) => status.map_err(|e| Error::ProcessFailure {
                command: command.display(),
                exit_code: None,
                stderr: format!("failed to wait for process: {e}"),
            })?,
            Outcome::TimedOut => {
                warn!(seconds = self.timeout.as_secs(), "Command timed out, killing it");
                kill(&mut child).await;
                return Err(Error::ProcessTimeout {
                    command: command.display(),
                    seconds: self.timeout.as_secs(),
                });
            }
            Outcome::Cancelled => {
                debug!("Cancelled, killing command");
                kill(&mut child).await;
                return Err(Error::Cancelled);
            }
        };

        let stderr = stderr_task.await.unwrap_or_default();
        let elapsed = start.elapsed();
        debug!(
            exit_code = ?status.code(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Command finished"
        );

        Ok(CapturedOutput {
            dir,
            exit_code: status.code(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            elapsed,
        })
    }
}

async fn kill(child: &mut tokio::process::Child) {
    if let Err(e) = child.kill().await {
        debug!("Failed to kill child process: {e}");
    }
}
