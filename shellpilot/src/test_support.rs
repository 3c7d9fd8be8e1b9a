//! Scripted collaborators for driving plans and sessions without a network or a shell.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::classifier::PlanLines;
use crate::core::types::PlanFailure;
use crate::io::oracle::{Oracle, OracleError, OracleRequest};
use crate::io::operator::Operator;
use crate::io::runner::{CommandRunner, Invocation, RunOutput, RunRequest};

/// Fresh scratch directory for one test.
pub fn workspace() -> TempDir {
    tempfile::tempdir().expect("create temp workspace")
}

/// Exit 0 with no output.
pub fn ok_run() -> RunOutput {
    RunOutput {
        exit_code: Some(0),
        stdout: String::new(),
        stderr: String::new(),
        timed_out: false,
    }
}

/// Exit 1 with `stderr` as the only output.
pub fn failed_run(stderr: &str) -> RunOutput {
    RunOutput {
        exit_code: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
        timed_out: false,
    }
}

/// Oracle that replays queued answers in order and records every request.
///
/// Running out of answers is reported as a request failure so tests notice
/// unexpected extra calls.
pub struct ScriptedOracle {
    answers: RefCell<VecDeque<Result<String, OracleError>>>,
    requests: RefCell<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn new(answers: Vec<Result<String, OracleError>>) -> Self {
        Self {
            answers: RefCell::new(answers.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }
}

impl Oracle for ScriptedOracle {
    fn complete(&self, request: &OracleRequest) -> Result<String, OracleError> {
        self.requests.borrow_mut().push(request.clone());
        self.answers
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Request("no scripted answer left".to_string())))
    }
}

/// Runner that never spawns anything.
///
/// Shell lines succeed unless registered with [`ScriptedRunner::fail_shell`].
/// Artifact runs pop from a queue and succeed once it is empty.
#[derive(Default)]
pub struct ScriptedRunner {
    shell: RefCell<HashMap<String, RunOutput>>,
    programs: RefCell<VecDeque<RunOutput>>,
    calls: RefCell<Vec<RunRequest>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every run of `line` returns `output`.
    pub fn fail_shell(&self, line: &str, output: RunOutput) {
        self.shell.borrow_mut().insert(line.to_string(), output);
    }

    pub fn push_program(&self, output: RunOutput) {
        self.programs.borrow_mut().push_back(output);
    }

    pub fn calls(&self) -> Vec<RunRequest> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, request: &RunRequest) -> Result<RunOutput> {
        self.calls.borrow_mut().push(request.clone());
        let output = match &request.invocation {
            Invocation::Shell(line) => self.shell.borrow().get(line).cloned(),
            Invocation::Program { .. } => self.programs.borrow_mut().pop_front(),
        };
        Ok(output.unwrap_or_else(ok_run))
    }
}

/// Operator with a fixed task, queued confirmations, and queued feedback.
///
/// Confirmations default to `true` and feedback to an empty string once the
/// queues run dry.
pub struct ScriptedOperator {
    task: String,
    confirmations: RefCell<VecDeque<bool>>,
    feedback: RefCell<VecDeque<String>>,
    confirm_calls: Cell<u32>,
    failures_seen: RefCell<Vec<PlanFailure>>,
}

impl ScriptedOperator {
    pub fn new(task: &str) -> Self {
        Self {
            task: task.to_string(),
            confirmations: RefCell::new(VecDeque::new()),
            feedback: RefCell::new(VecDeque::new()),
            confirm_calls: Cell::new(0),
            failures_seen: RefCell::new(Vec::new()),
        }
    }

    pub fn with_confirmations(self, answers: &[bool]) -> Self {
        self.confirmations.borrow_mut().extend(answers.iter().copied());
        self
    }

    pub fn with_feedback(self, replies: &[&str]) -> Self {
        self.feedback
            .borrow_mut()
            .extend(replies.iter().map(|reply| reply.to_string()));
        self
    }

    pub fn confirm_calls(&self) -> u32 {
        self.confirm_calls.get()
    }

    pub fn failures_seen(&self) -> Vec<PlanFailure> {
        self.failures_seen.borrow().clone()
    }
}

impl Operator for ScriptedOperator {
    fn task(&self) -> Result<String> {
        Ok(self.task.clone())
    }

    fn confirm_plan(&self, _plan: &PlanLines) -> Result<bool> {
        self.confirm_calls.set(self.confirm_calls.get() + 1);
        Ok(self.confirmations.borrow_mut().pop_front().unwrap_or(true))
    }

    fn feedback(&self, failure: &PlanFailure) -> Result<String> {
        self.failures_seen.borrow_mut().push(failure.clone());
        Ok(self.feedback.borrow_mut().pop_front().unwrap_or_default())
    }
}

/// Operator whose input channel is broken.
pub struct BrokenOperator;

impl Operator for BrokenOperator {
    fn task(&self) -> Result<String> {
        Err(anyhow!("operator input closed"))
    }

    fn confirm_plan(&self, _plan: &PlanLines) -> Result<bool> {
        Err(anyhow!("operator input closed"))
    }

    fn feedback(&self, _failure: &PlanFailure) -> Result<String> {
        Err(anyhow!("operator input closed"))
    }
}
