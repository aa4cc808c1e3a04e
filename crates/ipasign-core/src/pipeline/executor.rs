//! Command execution infrastructure.
//!
//! Provides the trait the pipeline uses to run external tools and a
//! process-based implementation.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{Result, SigningError};

/// Placeholder shown wherever a secret argument would appear.
pub const REDACTED: &str = "***";

/// A fully parameterized command: program plus argument vector.
///
/// Arguments are passed to the OS as-is; nothing is ever interpreted by a
/// shell. Arguments added with [`Invocation::secret_arg`] are masked in
/// `Debug` and [`Invocation::display_command`].
#[derive(Clone)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    secret_indices: Vec<usize>,
}

impl Invocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            secret_indices: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn secret_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.secret_indices.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Program name for diagnostics.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Returns the value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(OsString::as_os_str)
    }

    /// Human-readable command line with secrets masked.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program_name()];
        for (i, arg) in self.args.iter().enumerate() {
            if self.secret_indices.contains(&i) {
                parts.push(REDACTED.to_string());
            } else {
                parts.push(arg.to_string_lossy().into_owned());
            }
        }
        parts.join(" ")
    }
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.display_command())
            .finish()
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Diagnostic text for a failed command.
    ///
    /// Prefers stderr, then stdout, then a description of the exit status.
    pub fn diagnostic(&self) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        if !stderr.trim().is_empty() {
            return stderr.into_owned();
        }
        let stdout = String::from_utf8_lossy(&self.stdout);
        if !stdout.trim().is_empty() {
            return stdout.into_owned();
        }
        match self.exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Trait for running external tools.
///
/// Implementations can be:
/// - SystemRunner: spawns real processes on the host
/// - a scripted runner in tests that never touches the platform tools
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the invocation to completion and captures its output.
    ///
    /// A non-zero exit is reported through [`CommandOutput`], not as an error.
    /// Errors are reserved for failing to start or finish the process.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Process-based command runner.
///
/// Children are killed when the request that spawned them is dropped.
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    /// Creates a runner; `None` disables the per-command timeout.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(600)))
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        tracing::debug!("Running {}", invocation.display_command());

        let child = Command::new(invocation.program())
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SigningError::Spawn {
                program: invocation.program_name(),
                source: e,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| SigningError::Timeout {
                    program: invocation.program_name(),
                    secs: timeout.as_secs(),
                })??,
            None => child.wait_with_output().await?,
        };

        let output = CommandOutput::from(output);
        tracing::debug!(
            "{} finished with exit code {:?}",
            invocation.program_name(),
            output.exit_code
        );

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("/bin/sh").arg("-c").arg(script)
    }

    #[test]
    fn test_display_command_masks_secrets() {
        let invocation = Invocation::new("security")
            .arg("import")
            .arg("cert.p12")
            .arg("-P")
            .secret_arg("hunter2");

        assert_eq!(invocation.display_command(), "security import cert.p12 -P ***");
        assert!(!format!("{:?}", invocation).contains("hunter2"));
        // The real argument is still passed through untouched
        assert_eq!(invocation.args()[3], "hunter2");
    }

    #[test]
    fn test_flag_value() {
        let invocation = Invocation::new("xcrun").arg("-o").arg("/tmp/out.ipa").arg("-v");
        assert_eq!(invocation.flag_value("-o"), Some(OsStr::new("/tmp/out.ipa")));
        assert_eq!(invocation.flag_value("-v"), None);
        assert_eq!(invocation.flag_value("--embed"), None);
    }

    #[test]
    fn test_diagnostic_prefers_stderr() {
        let output = CommandOutput {
            exit_code: Some(1),
            stdout: b"out".to_vec(),
            stderr: b"err".to_vec(),
        };
        assert_eq!(output.diagnostic(), "err");
    }

    #[test]
    fn test_diagnostic_falls_back() {
        let output = CommandOutput {
            exit_code: Some(2),
            stdout: b"only stdout".to_vec(),
            stderr: b"  \n".to_vec(),
        };
        assert_eq!(output.diagnostic(), "only stdout");

        let output = CommandOutput {
            exit_code: Some(2),
            ..Default::default()
        };
        assert_eq!(output.diagnostic(), "exited with status 2");

        let output = CommandOutput::default();
        assert!(!output.success());
        assert_eq!(output.diagnostic(), "terminated by signal");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_success() {
        let runner = SystemRunner::new(Some(Duration::from_secs(10)));
        let output = runner.run(&sh("echo hello")).await.unwrap();

        assert!(output.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_failure_captures_stderr() {
        let runner = SystemRunner::new(None);
        let output = runner.run(&sh("echo broken >&2; exit 3")).await.unwrap();

        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.diagnostic().trim(), "broken");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_arguments_are_not_shell_interpreted() {
        let runner = SystemRunner::new(None);
        let invocation = Invocation::new("/bin/echo").arg("$(whoami); `id`");
        let output = runner.run(&invocation).await.unwrap();

        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "$(whoami); `id`");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_timeout() {
        let runner = SystemRunner::new(Some(Duration::from_millis(100)));
        let err = runner.run(&sh("sleep 5")).await.unwrap_err();

        assert!(matches!(err, SigningError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let runner = SystemRunner::default();
        let err = runner
            .run(&Invocation::new("/nonexistent/ipasign-test-tool"))
            .await
            .unwrap_err();

        match err {
            SigningError::Spawn { program, .. } => {
                assert_eq!(program, "/nonexistent/ipasign-test-tool")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
