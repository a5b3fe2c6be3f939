//! External tool invocation.
//!
//! Every privileged operation (loop attach/detach, device-mapper create/remove,
//! block size queries, image probing) goes through a [`CommandRunner`] so the
//! snapshot machinery can be driven by a recording fake in tests.

use std::io;
use std::process::{Command, Stdio};

use snapdisk_shared::errors::{SnapdiskError, SnapdiskResult};

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Narrow capability for running external tools.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and capture its output.
    ///
    /// A non-zero exit is NOT an error at this level; callers decide via
    /// [`CommandOutput::success`] or [`run_checked`].
    fn run(&self, program: &str, args: &[&str]) -> SnapdiskResult<CommandOutput>;
}

/// Runs tools as child processes of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> SnapdiskResult<CommandOutput> {
        tracing::debug!(program, ?args, "Running external command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => SnapdiskError::ToolNotFound(program.to_string()),
                _ => SnapdiskError::Storage(format!("Failed to execute {}: {}", program, e)),
            })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a command and return its trimmed stdout, failing on non-zero exit.
pub fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> SnapdiskResult<String> {
    let output = runner.run(program, args)?;
    if !output.success() {
        return Err(SnapdiskError::Command {
            program: program.to_string(),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output.stdout.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_runner_captures_stdout() {
        let out = SystemRunner::new().run("echo", &["hello"]).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn test_system_runner_missing_tool() {
        let err = SystemRunner::new()
            .run("snapdisk-no-such-tool", &[])
            .unwrap_err();
        assert!(matches!(err, SnapdiskError::ToolNotFound(ref t) if t == "snapdisk-no-such-tool"));
    }

    #[test]
    fn test_run_checked_reports_failure() {
        let err = run_checked(&SystemRunner::new(), "false", &[]).unwrap_err();
        assert!(matches!(
            err,
            SnapdiskError::Command {
                status: Some(1),
                ..
            }
        ));
    }
}
