//! Shared deterministic types for the execution core.
//!
//! These types define the contracts between the classifier, the plan executor,
//! the runtime validator, and the session driver. They hold no handles to
//! external state and can be built freely in tests.

use std::fmt;
use std::path::{Path, PathBuf};

/// Mutable record threaded through one session.
///
/// Owned by the session driver and lent to the plan executor, which updates it
/// in place. Nothing here is persisted across process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionState {
    /// Logical working directory. Every spawn and file write resolves against it.
    pub current_directory: PathBuf,
    /// Literal command strings already executed in this run, in execution order.
    pub executed_commands: Vec<String>,
    /// Informational only; never enforced.
    pub project_root: Option<PathBuf>,
}

impl ExecutionState {
    pub fn new(current_directory: impl Into<PathBuf>) -> Self {
        Self {
            current_directory: current_directory.into(),
            executed_commands: Vec::new(),
            project_root: None,
        }
    }

    pub fn with_project_root(mut self, project_root: Option<PathBuf>) -> Self {
        self.project_root = project_root;
        self
    }

    /// Whether `command` was already executed during this run.
    pub fn has_executed(&self, command: &str) -> bool {
        self.executed_commands.iter().any(|done| done == command)
    }

    pub fn record(&mut self, command: &str) {
        self.executed_commands.push(command.to_string());
    }

    /// Move the logical working directory. The first move also fixes the project root
    /// when none is known yet.
    pub fn change_directory(&mut self, dir: &Path) {
        if self.project_root.is_none() {
            self.project_root = Some(dir.to_path_buf());
        }
        self.current_directory = dir.to_path_buf();
    }
}

/// The operator's goal plus every piece of failure feedback gathered so far.
///
/// Grows monotonically: feedback is only ever appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    description: String,
}

impl Task {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            description: goal.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.description
    }

    /// Append operator feedback as a new `Error: ` line.
    pub fn append_feedback(&mut self, feedback: &str) {
        self.description.push_str("\nError: ");
        self.description.push_str(feedback.trim());
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Why a plan stopped before its last command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The planning/generation service failed or returned nothing.
    Oracle,
    /// A shell command exited non-zero or could not be spawned.
    Command,
    /// A directory change target could not be created or resolved.
    Directory,
    /// A shell command ran past its deadline and was killed.
    Timeout,
    /// A generated artifact kept failing after every allowed repair.
    ArtifactGaveUp,
    /// An artifact could not be written to disk.
    Filesystem,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Oracle => "oracle",
            FailureKind::Command => "command",
            FailureKind::Directory => "directory",
            FailureKind::Timeout => "timeout",
            FailureKind::ArtifactGaveUp => "artifact_gave_up",
            FailureKind::Filesystem => "filesystem",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The command that aborted a plan, and the diagnostic it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanFailure {
    pub kind: FailureKind,
    pub command: String,
    pub diagnostic: String,
}

/// Result of running one plan against the execution state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    /// Commands actually executed by this plan (duplicates and filtered lines excluded).
    pub executed: Vec<String>,
    /// First unrecoverable failure, if any. `None` means every candidate completed.
    pub failure: Option<PlanFailure>,
}

impl PlanOutcome {
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Terminal states of the runtime validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The artifact ran cleanly after `repairs` repair cycles.
    Done { repairs: u32 },
    /// The artifact is a static asset; nothing was executed.
    Static,
    /// The artifact still failed after `repairs` repair cycles.
    GaveUp { repairs: u32, diagnostic: String },
}

/// Terminal states of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A plan ran to completion on attempt `attempt` (1-indexed).
    Completed { attempt: u32 },
    /// The operator typed the exit sentinel instead of a task.
    Exited,
    /// The operator declined a plan.
    Aborted { attempt: u32 },
    /// Every allowed attempt failed.
    Exhausted { attempts: u32 },
}
