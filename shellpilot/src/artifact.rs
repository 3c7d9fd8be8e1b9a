//! Source generation for file-creation commands.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::core::fence::strip_fences;
use crate::io::oracle::{Oracle, OracleError, complete_text};
use crate::io::prompt::PromptEngine;

/// Ask the oracle for the full contents of `path` and return the effective source text.
///
/// Writing the result is the caller's job. Fails with [`OracleError`] when the call fails or
/// nothing is left once the formatting wrapper is removed.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn generate_artifact<O: Oracle + ?Sized>(
    oracle: &O,
    prompts: &PromptEngine,
    path: &Path,
    task: &str,
) -> Result<String> {
    let request = prompts.generate(task, path)?;
    let text = complete_text(oracle, &request)?;
    let source = effective_source(&text)?;
    debug!(bytes = source.len(), "generated artifact source");
    Ok(source)
}

/// Oracle text with any fence wrapper removed; blank results count as no answer.
pub(crate) fn effective_source(text: &str) -> Result<String, OracleError> {
    let source = strip_fences(text);
    if source.is_empty() {
        return Err(OracleError::Empty);
    }
    Ok(source)
}
