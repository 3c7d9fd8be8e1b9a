//! Execution of one oracle plan against the session's execution state.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::artifact::generate_artifact;
use crate::core::classifier::{Classified, candidate_commands, classify};
use crate::core::path::resolve_target;
use crate::core::types::{ExecutionState, FailureKind, PlanFailure, PlanOutcome, ValidationOutcome};
use crate::io::config::PilotConfig;
use crate::io::oracle::{Oracle, OracleError};
use crate::io::prompt::{DEFAULT_DIAGNOSTIC_BUDGET_BYTES, PromptEngine};
use crate::io::runner::{CommandRunner, Invocation, RunRequest};
use crate::io::workspace::{ensure_directory, write_artifact};
use crate::validate::validate_and_fix;

/// Limits and lookups shared by every command of a plan.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub max_repairs: u32,
    pub command_timeout: Duration,
    pub artifact_timeout: Duration,
    pub output_limit_bytes: usize,
    pub long_running: Vec<String>,
    /// Used to expand `~` in directory and file targets.
    pub home: Option<PathBuf>,
    pub diagnostic_budget_bytes: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self::from_config(&PilotConfig::default(), None)
    }
}

impl ExecConfig {
    pub fn from_config(cfg: &PilotConfig, home: Option<PathBuf>) -> Self {
        Self {
            max_repairs: cfg.max_repairs,
            command_timeout: cfg.command_timeout(),
            artifact_timeout: cfg.artifact_timeout(),
            output_limit_bytes: cfg.output_limit_bytes,
            long_running: cfg.long_running.clone(),
            home,
            diagnostic_budget_bytes: DEFAULT_DIAGNOSTIC_BUDGET_BYTES,
        }
    }
}

/// Progress notifications for the operator's view of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanEvent {
    LongRunningFiltered { command: String },
    DuplicateSkipped { command: String },
    DirectoryChanged { command: String, dir: PathBuf },
    CommandSucceeded { command: String, stdout: String, stderr: String },
    CommandFailed { command: String, kind: FailureKind, diagnostic: String },
    ArtifactWritten { path: PathBuf },
    ArtifactStatic { path: PathBuf },
    ArtifactPassed { path: PathBuf, stdout: String, stderr: String },
    ArtifactFailed { path: PathBuf, diagnostic: String },
    ArtifactRepaired { path: PathBuf, repair: u32 },
}

/// Run every candidate command of `plan` in order, mutating `state` as commands complete.
///
/// Commands already in `state.executed_commands` are skipped. The first command that
/// cannot be completed stops the plan; later commands are never attempted because they
/// usually depend on the earlier ones.
#[instrument(skip_all, fields(cwd = %state.current_directory.display()))]
pub fn execute_plan<O, R, F>(
    oracle: &O,
    runner: &R,
    config: &ExecConfig,
    plan: &str,
    state: &mut ExecutionState,
    task: &str,
    mut on_event: F,
) -> PlanOutcome
where
    O: Oracle + ?Sized,
    R: CommandRunner + ?Sized,
    F: FnMut(&PlanEvent),
{
    let lines = candidate_commands(plan, &config.long_running);
    for command in &lines.long_running {
        warn!(command = %command, "skipping long-running command");
        on_event(&PlanEvent::LongRunningFiltered {
            command: command.clone(),
        });
    }
    debug!(candidates = lines.candidates.len(), "plan parsed");

    let mut executed = Vec::new();
    for command in lines.candidates {
        if state.has_executed(&command) {
            debug!(command = %command, "already executed, skipping");
            on_event(&PlanEvent::DuplicateSkipped { command });
            continue;
        }

        let step = match classify(&command) {
            Classified::Skip => continue,
            Classified::DirectoryChange(target) => {
                change_directory(config, state, &command, &target, &mut on_event)
            }
            Classified::FileCreation(target) => {
                create_file(oracle, runner, config, state, &target, task, &mut on_event)
            }
            Classified::ShellCommand => run_shell(runner, config, state, &command, &mut on_event),
        };

        if let Err((kind, diagnostic)) = step {
            warn!(command = %command, kind = %kind, "plan aborted");
            on_event(&PlanEvent::CommandFailed {
                command: command.clone(),
                kind,
                diagnostic: diagnostic.clone(),
            });
            return PlanOutcome {
                executed,
                failure: Some(PlanFailure {
                    kind,
                    command,
                    diagnostic,
                }),
            };
        }

        state.record(&command);
        executed.push(command);
    }

    info!(executed = executed.len(), "plan completed");
    PlanOutcome {
        executed,
        failure: None,
    }
}

type StepResult = Result<(), (FailureKind, String)>;

fn change_directory<F: FnMut(&PlanEvent)>(
    config: &ExecConfig,
    state: &mut ExecutionState,
    command: &str,
    target: &str,
    on_event: &mut F,
) -> StepResult {
    let dir = resolve_target(&state.current_directory, target, config.home.as_deref());
    ensure_directory(&dir).map_err(|err| (FailureKind::Directory, format!("{err:#}")))?;
    info!(dir = %dir.display(), "changed directory");
    state.change_directory(&dir);
    on_event(&PlanEvent::DirectoryChanged {
        command: command.to_string(),
        dir,
    });
    Ok(())
}

fn create_file<O, R, F>(
    oracle: &O,
    runner: &R,
    config: &ExecConfig,
    state: &ExecutionState,
    target: &str,
    task: &str,
    on_event: &mut F,
) -> StepResult
where
    O: Oracle + ?Sized,
    R: CommandRunner + ?Sized,
    F: FnMut(&PlanEvent),
{
    let path = resolve_target(&state.current_directory, target, config.home.as_deref());
    let prompts = PromptEngine::new(config.diagnostic_budget_bytes);

    let source = generate_artifact(oracle, &prompts, &path, task)
        .map_err(|err| (FailureKind::Oracle, format!("{err:#}")))?;
    write_artifact(&path, &source).map_err(|err| (FailureKind::Filesystem, format!("{err:#}")))?;
    info!(path = %path.display(), "artifact written");
    on_event(&PlanEvent::ArtifactWritten { path: path.clone() });

    match validate_and_fix(
        oracle,
        runner,
        config,
        &path,
        &state.current_directory,
        task,
        on_event,
    ) {
        Ok(ValidationOutcome::Done { .. } | ValidationOutcome::Static) => Ok(()),
        Ok(ValidationOutcome::GaveUp {
            repairs,
            diagnostic,
        }) => Err((
            FailureKind::ArtifactGaveUp,
            format!("{} still failing after {repairs} repairs:\n{diagnostic}", path.display()),
        )),
        Err(err) => {
            let kind = if err.downcast_ref::<OracleError>().is_some() {
                FailureKind::Oracle
            } else {
                FailureKind::Filesystem
            };
            Err((kind, format!("{err:#}")))
        }
    }
}

fn run_shell<R, F>(
    runner: &R,
    config: &ExecConfig,
    state: &ExecutionState,
    command: &str,
    on_event: &mut F,
) -> StepResult
where
    R: CommandRunner + ?Sized,
    F: FnMut(&PlanEvent),
{
    let request = RunRequest {
        invocation: Invocation::Shell(command.to_string()),
        workdir: state.current_directory.clone(),
        timeout: config.command_timeout,
        output_limit_bytes: config.output_limit_bytes,
    };
    let output = runner
        .run(&request)
        .map_err(|err| (FailureKind::Command, format!("{err:#}")))?;
    if output.timed_out {
        return Err((
            FailureKind::Timeout,
            output.timeout_diagnostic(config.command_timeout),
        ));
    }
    if !output.success() {
        return Err((FailureKind::Command, output.diagnostic()));
    }
    on_event(&PlanEvent::CommandSucceeded {
        command: command.to_string(),
        stdout: output.stdout,
        stderr: output.stderr,
    });
    Ok(())
}
