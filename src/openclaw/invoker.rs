//! Child-process execution for the OpenClaw CLI.
//!
//! Commands are always an argv list; nothing is ever passed through a shell,
//! so job ids and other caller-supplied values travel as discrete arguments.

use crate::openclaw::errors::InvokeError;
use crate::utils::{fmt_duration, log_if_slow};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

/// How a non-zero exit status is treated when stdout is non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPolicy {
    /// Any non-zero exit is a failure.
    Strict,
    /// A non-zero exit still succeeds if stdout parses as the expected data.
    AcceptOutput,
}

/// One invocation: arguments after the program name, plus its limits.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub args: Vec<String>,
    pub timeout: Duration,
    pub exit_policy: ExitPolicy,
}

impl CommandSpec {
    pub fn new<I, S>(args: I, timeout: Duration, exit_policy: ExitPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            timeout,
            exit_policy,
        }
    }

    /// The argument list joined for logs and error messages.
    pub fn display(&self) -> String {
        self.args.join(" ")
    }
}

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn the output into a payload, applying the command's exit policy.
    ///
    /// Under [`ExitPolicy::AcceptOutput`] a failed exit with non-empty stdout
    /// is handed to `parse`; if that also fails the process failure is what
    /// gets reported, since it is the more useful diagnosis.
    pub fn into_payload<T>(
        self,
        spec: &CommandSpec,
        parse: impl FnOnce(&str) -> Result<T, InvokeError>,
    ) -> Result<T, InvokeError> {
        if self.success() {
            return parse(&self.stdout);
        }

        let failure = InvokeError::ProcessFailed {
            command: spec.display(),
            exit_code: self.exit_code,
            stderr: truncate(self.stderr.trim(), 2048),
        };

        if spec.exit_policy == ExitPolicy::AcceptOutput && !self.stdout.trim().is_empty() {
            match parse(&self.stdout) {
                Ok(payload) => {
                    debug!(
                        command = %spec.display(),
                        exit_code = ?self.exit_code,
                        "accepting output from non-zero exit"
                    );
                    return Ok(payload);
                }
                Err(e) => {
                    debug!(error = %e, "output from non-zero exit did not parse");
                }
            }
        }

        Err(failure)
    }
}

/// Runs OpenClaw CLI commands. The seam exists so caches and handlers can be
/// exercised without spawning processes.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, InvokeError>;
}

/// Runs the real executable with a hard wall-clock timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    /// Overrides applied on top of the inherited environment.
    env: Vec<(String, String)>,
    slow_threshold: Duration,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            env: Vec::new(),
            slow_threshold: Duration::from_secs(3),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, InvokeError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&spec.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            program = %self.program,
            args = ?spec.args,
            timeout = fmt_duration(spec.timeout),
            "spawning"
        );

        let start = Instant::now();
        let child = cmd.spawn().map_err(|e| InvokeError::Spawn {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        // Dropping the wait future on timeout drops the child, and
        // `kill_on_drop` terminates it.
        let output = match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(InvokeError::Spawn {
                    program: self.program.clone(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    command = %spec.display(),
                    timeout = fmt_duration(spec.timeout),
                    "command timed out, killed"
                );
                return Err(InvokeError::Timeout {
                    command: spec.display(),
                    timeout: spec.timeout,
                });
            }
        };

        log_if_slow(start, self.slow_threshold, &spec.display());

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(policy: ExitPolicy) -> CommandSpec {
        CommandSpec::new(["status", "--json"], Duration::from_secs(5), policy)
    }

    fn output(stdout: &str, exit_code: Option<i32>) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: "gateway unreachable".to_string(),
            exit_code,
        }
    }

    fn parse_number(s: &str) -> Result<u32, InvokeError> {
        s.trim()
            .parse()
            .map_err(|_| InvokeError::MalformedOutput(s.to_string()))
    }

    #[test]
    fn successful_exit_parses_stdout() {
        let out = output("42", Some(0));
        assert_eq!(out.into_payload(&spec(ExitPolicy::Strict), parse_number), Ok(42));
    }

    #[test]
    fn strict_policy_rejects_non_zero_exit_even_with_output() {
        let err = output("42", Some(1))
            .into_payload(&spec(ExitPolicy::Strict), parse_number)
            .unwrap_err();
        assert_eq!(
            err,
            InvokeError::ProcessFailed {
                command: "status --json".into(),
                exit_code: Some(1),
                stderr: "gateway unreachable".into(),
            }
        );
    }

    #[test]
    fn accept_policy_uses_parseable_output() {
        let out = output("42", Some(1));
        assert_eq!(out.into_payload(&spec(ExitPolicy::AcceptOutput), parse_number), Ok(42));
    }

    #[test]
    fn accept_policy_reports_process_failure_when_output_unusable() {
        let err = output("not a number", Some(2))
            .into_payload(&spec(ExitPolicy::AcceptOutput), parse_number)
            .unwrap_err();
        assert!(matches!(err, InvokeError::ProcessFailed { exit_code: Some(2), .. }));

        let err = output("  \n", Some(2))
            .into_payload(&spec(ExitPolicy::AcceptOutput), parse_number)
            .unwrap_err();
        assert_eq!(err.kind(), "process_failed");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("ab·cd", 3), "ab·…");
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let runner = ProcessRunner::new("mission-control-definitely-missing-binary");
        let err = runner.run(&spec(ExitPolicy::Strict)).await.unwrap_err();
        assert_eq!(err.kind(), "spawn_failed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_stderr_and_exit_code() {
        let runner = ProcessRunner::new("sh");
        let spec = CommandSpec::new(
            ["-c", "echo '{\"ok\":true}'; echo oops >&2; exit 3"],
            Duration::from_secs(5),
            ExitPolicy::Strict,
        );
        let out = runner.run(&spec).await.unwrap();
        assert_eq!(out.stdout.trim(), "{\"ok\":true}");
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.exit_code, Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn environment_overrides_reach_the_child() {
        let runner = ProcessRunner::new("sh").env("HOME", "/tmp/openclaw-home");
        let spec = CommandSpec::new(
            ["-c", "printf %s \"$HOME\""],
            Duration::from_secs(5),
            ExitPolicy::Strict,
        );
        let out = runner.run(&spec).await.unwrap();
        assert_eq!(out.stdout, "/tmp/openclaw-home");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn arguments_are_not_shell_interpreted() {
        let runner = ProcessRunner::new("printf");
        let spec = CommandSpec::new(
            ["%s", "job; rm -rf / $(whoami)"],
            Duration::from_secs(5),
            ExitPolicy::Strict,
        );
        let out = runner.run(&spec).await.unwrap();
        assert_eq!(out.stdout, "job; rm -rf / $(whoami)");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_process_times_out() {
        let runner = ProcessRunner::new("sh");
        let spec = CommandSpec::new(
            ["-c", "sleep 5"],
            Duration::from_millis(100),
            ExitPolicy::Strict,
        );
        let start = Instant::now();
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, InvokeError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
