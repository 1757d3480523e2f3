//! Execution of external commands, used to hash passwords with `htpasswd`.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use snafu::{ResultExt as _, Snafu, ensure};
use tracing::{debug, instrument};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to run {program:?}"))]
    Spawn {
        source: std::io::Error,
        program: String,
    },

    #[snafu(display("{program:?} failed with {status}: {stderr}"))]
    ExitStatus {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[snafu(display("{program:?} wrote invalid UTF-8 to stdout"))]
    DecodeStdout {
        source: std::string::FromUtf8Error,
        program: String,
    },
}

/// Captured output of a successful command.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs an external program to completion.
///
/// A non-zero exit is an error which carries the captured stderr.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// A [`CommandRunner`] spawning real processes, without a shell in between.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    // Arguments may contain secrets and are never recorded.
    #[instrument(skip(self, args))]
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .context(SpawnSnafu { program })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        ensure!(
            output.status.success(),
            ExitStatusSnafu {
                program,
                status: output.status,
                stderr: stderr.trim(),
            }
        );

        let stdout = String::from_utf8(output.stdout).context(DecodeStdoutSnafu { program })?;
        debug!(stdout_len = stdout.len(), "command finished");

        Ok(CommandOutput { stdout, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let output = ProcessRunner
            .run("sh", &["-c", "echo 'admin:$2y$05$hash'; echo warning >&2"])
            .await
            .expect("command must succeed");

        assert_eq!(output.stdout, "admin:$2y$05$hash\n");
        assert_eq!(output.stderr, "warning\n");
    }

    #[tokio::test]
    async fn failing_command_reports_stderr() {
        let error = ProcessRunner
            .run("sh", &["-c", "echo 'bad option' >&2; exit 3"])
            .await
            .expect_err("command must fail");

        assert!(
            matches!(
                &error,
                Error::ExitStatus { status, stderr, .. }
                    if status.code() == Some(3) && stderr == "bad option"
            ),
            "unexpected error: {error}"
        );
        assert!(error.to_string().ends_with(": bad option"));
    }

    #[tokio::test]
    async fn missing_program_cannot_be_spawned() {
        let error = ProcessRunner
            .run("this-program-does-not-exist", &[])
            .await
            .expect_err("spawning must fail");

        assert!(matches!(error, Error::Spawn { .. }));
    }
}
