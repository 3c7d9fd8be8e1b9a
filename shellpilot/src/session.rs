//! The top-level attempt loop: plan, confirm, execute, learn from failure.
//!
//! One session owns one [`ExecutionState`]. Every attempt asks the planning
//! oracle for a fresh plan seeded with that state, so commands that already
//! succeeded are visible to the oracle and skipped by the executor.
//! Operator feedback from failed attempts accumulates on the [`Task`].

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::classifier::candidate_commands;
use crate::core::types::{ExecutionState, FailureKind, PlanFailure, SessionOutcome, Task};
use crate::io::config::PilotConfig;
use crate::io::operator::{Operator, is_exit_sentinel};
use crate::io::oracle::{Oracle, complete_text};
use crate::io::prompt::PromptEngine;
use crate::io::runner::CommandRunner;
use crate::plan::{ExecConfig, PlanEvent, execute_plan};

/// Placeholder command reported when the planning call itself fails.
pub const PLANNING_STEP: &str = "(planning)";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_attempts: u32,
    /// Preset project root; otherwise learned from the first directory change.
    pub project_root: Option<PathBuf>,
    pub exec: ExecConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_config(&PilotConfig::default(), None)
    }
}

impl SessionConfig {
    pub fn from_config(cfg: &PilotConfig, home: Option<PathBuf>) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            project_root: cfg.project_root.clone(),
            exec: ExecConfig::from_config(cfg, home),
        }
    }
}

/// How a session ended, with the final task text and execution state.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub task: Task,
    pub state: ExecutionState,
}

/// Run one session starting in `start_dir`.
///
/// Errors are limited to operator I/O and prompt rendering. Oracle, command,
/// and artifact failures count against the attempt ceiling instead.
#[instrument(skip_all, fields(start_dir = %start_dir.display(), max_attempts = config.max_attempts))]
pub fn run_session<O, R, P, F>(
    oracle: &O,
    runner: &R,
    operator: &P,
    config: &SessionConfig,
    start_dir: PathBuf,
    mut on_event: F,
) -> Result<SessionReport>
where
    O: Oracle + ?Sized,
    R: CommandRunner + ?Sized,
    P: Operator + ?Sized,
    F: FnMut(&PlanEvent),
{
    let mut state = ExecutionState::new(start_dir).with_project_root(config.project_root.clone());

    let goal = operator.task()?;
    let mut task = Task::new(goal.trim());
    if is_exit_sentinel(&goal) {
        info!("exit requested");
        return Ok(SessionReport {
            outcome: SessionOutcome::Exited,
            task,
            state,
        });
    }

    let prompts = PromptEngine::new(config.exec.diagnostic_budget_bytes);
    let mut attempt = 0u32;
    while attempt < config.max_attempts {
        let number = attempt + 1;
        info!(attempt = number, "planning");

        let request = prompts.plan(task.as_str(), &state)?;
        let failure = match complete_text(oracle, &request) {
            Ok(plan) => {
                let lines = candidate_commands(&plan, &config.exec.long_running);
                if !operator.confirm_plan(&lines)? {
                    info!(attempt = number, "plan declined");
                    return Ok(SessionReport {
                        outcome: SessionOutcome::Aborted { attempt: number },
                        task,
                        state,
                    });
                }
                let outcome = execute_plan(
                    oracle,
                    runner,
                    &config.exec,
                    &plan,
                    &mut state,
                    task.as_str(),
                    &mut on_event,
                );
                match outcome.failure {
                    None => {
                        info!(attempt = number, "session completed");
                        return Ok(SessionReport {
                            outcome: SessionOutcome::Completed { attempt: number },
                            task,
                            state,
                        });
                    }
                    Some(failure) => failure,
                }
            }
            Err(err) => PlanFailure {
                kind: FailureKind::Oracle,
                command: PLANNING_STEP.to_string(),
                diagnostic: err.to_string(),
            },
        };

        attempt += 1;
        warn!(attempt = number, kind = %failure.kind, command = %failure.command, "attempt failed");
        let feedback = operator.feedback(&failure)?;
        task.append_feedback(&feedback_line(&feedback, &failure));
    }

    warn!(attempts = attempt, "maximum attempts reached");
    Ok(SessionReport {
        outcome: SessionOutcome::Exhausted { attempts: attempt },
        task,
        state,
    })
}

/// Operator text, or a one-line failure summary when the operator said nothing.
fn feedback_line(feedback: &str, failure: &PlanFailure) -> String {
    let feedback = feedback.trim();
    if !feedback.is_empty() {
        return feedback.to_string();
    }
    let first = failure.diagnostic.lines().next().unwrap_or_default().trim();
    format!("{} failed ({}): {first}", failure.command, failure.kind)
}
