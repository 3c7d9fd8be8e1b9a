//! The human operator: goal entry, plan confirmation, failure feedback.

use std::cell::RefCell;
use std::io::{BufRead, Stdout, StdinLock, Write};

use anyhow::{Context, Result};

use crate::core::classifier::PlanLines;
use crate::core::types::PlanFailure;

/// Input that ends the program instead of starting a session.
pub const EXIT_SENTINEL: &str = "exit";

/// Whether the operator's task input is the exit sentinel (any letter case).
pub fn is_exit_sentinel(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(EXIT_SENTINEL)
}

/// Synchronous request/response collaborator for everything the loop asks a human.
pub trait Operator {
    /// The goal for this session.
    fn task(&self) -> Result<String>;
    /// Approve a plan before anything runs. `false` aborts the session.
    fn confirm_plan(&self, plan: &PlanLines) -> Result<bool>;
    /// Free-text guidance after a failed attempt; appended to the task.
    fn feedback(&self, failure: &PlanFailure) -> Result<String>;
}

/// Line-oriented operator over a reader and a writer (normally stdin/stdout).
pub struct TerminalOperator<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
    preset_task: Option<String>,
    auto_confirm: bool,
}

impl TerminalOperator<StdinLock<'static>, Stdout> {
    pub fn stdio(preset_task: Option<String>, auto_confirm: bool) -> Self {
        Self::new(
            std::io::stdin().lock(),
            std::io::stdout(),
            preset_task,
            auto_confirm,
        )
    }
}

impl<R: BufRead, W: Write> TerminalOperator<R, W> {
    pub fn new(input: R, output: W, preset_task: Option<String>, auto_confirm: bool) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
            preset_task,
            auto_confirm,
        }
    }

    pub fn into_output(self) -> W {
        self.output.into_inner()
    }

    fn ask(&self, question: &str) -> Result<Option<String>> {
        {
            let mut out = self.output.borrow_mut();
            write!(out, "{question}").context("write prompt")?;
            out.flush().context("flush prompt")?;
        }
        let mut line = String::new();
        let n = self
            .input
            .borrow_mut()
            .read_line(&mut line)
            .context("read operator input")?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn say(&self, text: &str) -> Result<()> {
        writeln!(self.output.borrow_mut(), "{text}").context("write operator output")
    }
}

impl<R: BufRead, W: Write> Operator for TerminalOperator<R, W> {
    fn task(&self) -> Result<String> {
        if let Some(task) = &self.preset_task {
            return Ok(task.clone());
        }
        // A closed stdin behaves like typing the sentinel.
        Ok(self
            .ask("What should I do? (type 'exit' to quit)\n> ")?
            .unwrap_or_else(|| EXIT_SENTINEL.to_string()))
    }

    fn confirm_plan(&self, plan: &PlanLines) -> Result<bool> {
        self.say("\nProposed plan:")?;
        for (idx, command) in plan.candidates.iter().enumerate() {
            self.say(&format!("  {}. {command}", idx + 1))?;
        }
        for command in &plan.long_running {
            self.say(&format!("  (skipped, long-running) {command}"))?;
        }
        if self.auto_confirm {
            self.say("Running plan (auto-confirmed).")?;
            return Ok(true);
        }
        let answer = self.ask("Run this plan? [y/N] ")?.unwrap_or_default();
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    fn feedback(&self, failure: &PlanFailure) -> Result<String> {
        self.say(&format!(
            "\nAttempt failed ({}) at `{}`:\n{}",
            failure.kind, failure.command, failure.diagnostic
        ))?;
        Ok(self
            .ask("What went wrong or what should change?\n> ")?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FailureKind;
    use std::io::Cursor;

    fn operator(input: &str, auto_confirm: bool) -> TerminalOperator<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalOperator::new(
            Cursor::new(input.as_bytes().to_vec()),
            Vec::new(),
            None,
            auto_confirm,
        )
    }

    fn plan() -> PlanLines {
        PlanLines {
            candidates: vec!["mkdir app".to_string(), "cd app".to_string()],
            long_running: vec!["npm run dev".to_string()],
        }
    }

    #[test]
    fn exit_sentinel_ignores_case_and_whitespace() {
        assert!(is_exit_sentinel("exit"));
        assert!(is_exit_sentinel("  EXIT \n"));
        assert!(is_exit_sentinel("Exit"));
        assert!(!is_exit_sentinel("exit now"));
    }

    #[test]
    fn task_reads_one_line() {
        let op = operator("build a blog\nignored\n", false);
        assert_eq!(op.task().expect("task"), "build a blog");
    }

    #[test]
    fn closed_input_reads_as_exit() {
        let op = operator("", false);
        assert!(is_exit_sentinel(&op.task().expect("task")));
    }

    #[test]
    fn preset_task_skips_prompt() {
        let op = TerminalOperator::new(
            Cursor::new(Vec::new()),
            Vec::new(),
            Some("from flag".to_string()),
            false,
        );
        assert_eq!(op.task().expect("task"), "from flag");
        assert!(op.into_output().is_empty());
    }

    #[test]
    fn confirm_accepts_yes_and_lists_plan() {
        let op = operator("YES\n", false);
        assert!(op.confirm_plan(&plan()).expect("confirm"));
        let shown = String::from_utf8(op.into_output()).expect("utf8");
        assert!(shown.contains("1. mkdir app"));
        assert!(shown.contains("2. cd app"));
        assert!(shown.contains("(skipped, long-running) npm run dev"));
    }

    #[test]
    fn confirm_defaults_to_no() {
        assert!(!operator("\n", false).confirm_plan(&plan()).expect("confirm"));
        assert!(!operator("", false).confirm_plan(&plan()).expect("confirm"));
    }

    #[test]
    fn auto_confirm_does_not_read_input() {
        let op = operator("n\n", true);
        assert!(op.confirm_plan(&plan()).expect("confirm"));
    }

    #[test]
    fn feedback_shows_failure_and_reads_reply() {
        let op = operator("install node first\n", false);
        let failure = PlanFailure {
            kind: FailureKind::Command,
            command: "npm install".to_string(),
            diagnostic: "npm: not found".to_string(),
        };
        assert_eq!(op.feedback(&failure).expect("feedback"), "install node first");
        let shown = String::from_utf8(op.into_output()).expect("utf8");
        assert!(shown.contains("Attempt failed (command) at `npm install`"));
        assert!(shown.contains("npm: not found"));
    }
}
