//! Runtime validation of generated artifacts with bounded self-repair.
//!
//! A runnable artifact is executed with the interpreter implied by its
//! extension. On failure the current file and the diagnostic go back to the
//! oracle, the file is replaced with the answer, and the run is retried. The
//! loop ends in `Done`, or in `GaveUp` once `max_repairs` cycles are spent.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::artifact::effective_source;
use crate::core::interpreter::{ArtifactKind, artifact_kind};
use crate::core::types::ValidationOutcome;
use crate::io::oracle::{Oracle, complete_text};
use crate::io::prompt::PromptEngine;
use crate::io::runner::{CommandRunner, Invocation, RunRequest};
use crate::io::workspace::{read_artifact, write_artifact};
use crate::plan::{ExecConfig, PlanEvent};

/// Run the artifact at `path` from `workdir`, repairing it until it succeeds or the repair
/// budget runs out.
///
/// Errors are reserved for failures of the repair machinery itself: the oracle call, or
/// reading/writing the artifact. A program that keeps failing is a `GaveUp` outcome.
#[instrument(skip_all, fields(path = %path.display(), max_repairs = config.max_repairs))]
pub fn validate_and_fix<O, R, F>(
    oracle: &O,
    runner: &R,
    config: &ExecConfig,
    path: &Path,
    workdir: &Path,
    task: &str,
    on_event: &mut F,
) -> Result<ValidationOutcome>
where
    O: Oracle + ?Sized,
    R: CommandRunner + ?Sized,
    F: FnMut(&PlanEvent),
{
    let program = match artifact_kind(path) {
        ArtifactKind::Runnable { program } => program,
        ArtifactKind::Static => {
            debug!("static asset, nothing to run");
            on_event(&PlanEvent::ArtifactStatic {
                path: path.to_path_buf(),
            });
            return Ok(ValidationOutcome::Static);
        }
    };

    let prompts = PromptEngine::new(config.diagnostic_budget_bytes);
    let request = RunRequest {
        invocation: Invocation::Program {
            program: program.to_string(),
            file: path.to_path_buf(),
        },
        workdir: workdir.to_path_buf(),
        timeout: config.artifact_timeout,
        output_limit_bytes: config.output_limit_bytes,
    };

    let mut repairs = 0u32;
    loop {
        let diagnostic = match runner.run(&request) {
            Ok(output) if output.success() => {
                info!(repairs, "artifact ran cleanly");
                on_event(&PlanEvent::ArtifactPassed {
                    path: path.to_path_buf(),
                    stdout: output.stdout,
                    stderr: output.stderr,
                });
                return Ok(ValidationOutcome::Done { repairs });
            }
            Ok(output) if output.timed_out => output.timeout_diagnostic(config.artifact_timeout),
            Ok(output) => output.diagnostic(),
            Err(err) => format!("{err:#}"),
        };

        warn!(repairs, "artifact failed");
        on_event(&PlanEvent::ArtifactFailed {
            path: path.to_path_buf(),
            diagnostic: diagnostic.clone(),
        });
        if repairs >= config.max_repairs {
            warn!(repairs, "repair budget exhausted");
            return Ok(ValidationOutcome::GaveUp {
                repairs,
                diagnostic,
            });
        }

        let code = read_artifact(path)?;
        let repair = prompts.repair(task, path, &code, &diagnostic)?;
        let answer = complete_text(oracle, &repair)?;
        let fixed = effective_source(&answer)?;
        write_artifact(path, &fixed)?;
        repairs += 1;
        debug!(repairs, "artifact replaced with repaired version");
        on_event(&PlanEvent::ArtifactRepaired {
            path: path.to_path_buf(),
            repair: repairs,
        });
    }
}
