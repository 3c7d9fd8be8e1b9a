//! Command runner abstraction for shell commands and artifact runs.
//!
//! The [`CommandRunner`] trait decouples plan execution from real subprocesses.
//! Tests use scripted runners that return predetermined outputs and record
//! what would have been spawned.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_with_timeout;

/// What to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// A plan line handed to `sh -c` verbatim.
    Shell(String),
    /// `<program> <file>` for a generated artifact.
    Program { program: String, file: PathBuf },
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Shell(line) => f.write_str(line),
            Invocation::Program { program, file } => write!(f, "{program} {}", file.display()),
        }
    }
}

/// Parameters for a single spawn.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub invocation: Invocation,
    /// Working directory for the child; never the process-wide cwd implicitly.
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// Captured result of a finished (or killed) child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Exit code; `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Failure text for operators and repair prompts: stderr when present, otherwise a
    /// summary of how the child ended plus any stdout.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let ending = if self.timed_out {
            "timed out".to_string()
        } else {
            match self.exit_code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            }
        };
        let stdout = self.stdout.trim();
        if stdout.is_empty() {
            ending
        } else {
            format!("{ending}\n{stdout}")
        }
    }

    /// Diagnostic for a run killed at `timeout`: the deadline first, then whatever the
    /// program printed before it was stopped.
    pub fn timeout_diagnostic(&self, timeout: Duration) -> String {
        let mut text = format!("timed out after {timeout:?}");
        let detail = match self.stderr.trim() {
            "" => self.stdout.trim(),
            stderr => stderr,
        };
        if !detail.is_empty() {
            text.push('\n');
            text.push_str(detail);
        }
        text
    }
}

/// Abstraction over process execution backends.
pub trait CommandRunner {
    /// Spawn and wait. Errors mean the child could not be started at all.
    fn run(&self, request: &RunRequest) -> Result<RunOutput>;
}

/// Runner that spawns real child processes.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    #[instrument(skip_all, fields(command = %request.invocation, workdir = %request.workdir.display()))]
    fn run(&self, request: &RunRequest) -> Result<RunOutput> {
        let mut cmd = match &request.invocation {
            Invocation::Shell(line) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(line);
                cmd
            }
            Invocation::Program { program, file } => {
                let mut cmd = Command::new(program);
                cmd.arg(file);
                cmd
            }
        };
        cmd.current_dir(&request.workdir);

        info!("running command");
        let output = run_with_timeout(cmd, request.timeout, request.output_limit_bytes)?;
        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "command timed out");
        } else if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "command failed");
        } else {
            debug!("command succeeded");
        }

        Ok(RunOutput {
            exit_code: output.status.code(),
            stdout: output.stdout_text(),
            stderr: output.stderr_text(),
            timed_out: output.timed_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(invocation: Invocation, workdir: PathBuf) -> RunRequest {
        RunRequest {
            invocation,
            workdir,
            timeout: Duration::from_secs(10),
            output_limit_bytes: 10_000,
        }
    }

    #[test]
    fn shell_line_runs_in_requested_workdir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = SystemRunner
            .run(&request(
                Invocation::Shell("pwd".to_string()),
                temp.path().to_path_buf(),
            ))
            .expect("run");
        assert!(output.success());
        let reported = PathBuf::from(output.stdout.trim());
        assert_eq!(
            reported.canonicalize().expect("canonical stdout"),
            temp.path().canonicalize().expect("canonical temp")
        );
    }

    #[test]
    fn program_invocation_passes_file_argument() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("hello.sh"), "echo hello from script\n").expect("write");
        let output = SystemRunner
            .run(&request(
                Invocation::Program {
                    program: "sh".to_string(),
                    file: PathBuf::from("hello.sh"),
                },
                temp.path().to_path_buf(),
            ))
            .expect("run");
        assert!(output.success());
        assert_eq!(output.stdout, "hello from script\n");
    }

    #[test]
    fn diagnostic_prefers_stderr() {
        let output = RunOutput {
            exit_code: Some(1),
            stdout: "partial".to_string(),
            stderr: "  boom\n".to_string(),
            timed_out: false,
        };
        assert_eq!(output.diagnostic(), "boom");
    }

    #[test]
    fn diagnostic_falls_back_to_exit_summary() {
        let output = RunOutput {
            exit_code: Some(2),
            stdout: "usage: x".to_string(),
            stderr: String::new(),
            timed_out: false,
        };
        assert_eq!(output.diagnostic(), "exited with status 2\nusage: x");

        let killed = RunOutput {
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            timed_out: true,
        };
        assert!(!killed.success());
        assert_eq!(killed.diagnostic(), "timed out");
    }

    #[test]
    fn timeout_diagnostic_leads_with_deadline() {
        let hung = RunOutput {
            exit_code: None,
            stdout: "waiting for input\n".to_string(),
            stderr: "  warning: slow\n".to_string(),
            timed_out: true,
        };
        assert_eq!(
            hung.timeout_diagnostic(Duration::from_secs(60)),
            "timed out after 60s\nwarning: slow"
        );

        let quiet = RunOutput {
            stderr: String::new(),
            ..hung.clone()
        };
        assert_eq!(
            quiet.timeout_diagnostic(Duration::from_millis(300)),
            "timed out after 300ms\nwaiting for input"
        );
    }
}
