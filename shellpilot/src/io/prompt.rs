//! Prompt rendering for the three oracle request shapes.

use std::path::Path;

use anyhow::Result;
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::types::ExecutionState;
use crate::io::oracle::{OraclePurpose, OracleRequest};

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");
const REPAIR_TEMPLATE: &str = include_str!("prompts/repair.md");

const PLANNER_SYSTEM: &str =
    "You turn goals into terse, correct shell command sequences. Output commands only.";
const CODER_SYSTEM: &str =
    "You are a senior engineer who writes complete, working source files. Output code only.";

/// Diagnostics longer than this are clipped to their tail before being sent for repair.
pub const DEFAULT_DIAGNOSTIC_BUDGET_BYTES: usize = 8_000;

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
    diagnostic_budget_bytes: usize,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTIC_BUDGET_BYTES)
    }
}

impl PromptEngine {
    pub fn new(diagnostic_budget_bytes: usize) -> Self {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .expect("planner template should be valid");
        env.add_template("generate", GENERATE_TEMPLATE)
            .expect("generate template should be valid");
        env.add_template("repair", REPAIR_TEMPLATE)
            .expect("repair template should be valid");
        Self {
            env,
            diagnostic_budget_bytes,
        }
    }

    /// Planning request seeded with the task and everything the session has learned so far.
    pub fn plan(&self, task: &str, state: &ExecutionState) -> Result<OracleRequest> {
        let template = self.env.get_template("planner")?;
        let prompt = template.render(context! {
            task => task.trim(),
            current_directory => state.current_directory.display().to_string(),
            project_root => state.project_root.as_ref().map(|root| root.display().to_string()),
            executed => &state.executed_commands,
        })?;
        Ok(OracleRequest {
            purpose: OraclePurpose::Plan,
            system: PLANNER_SYSTEM.to_string(),
            prompt,
        })
    }

    /// Generation request for a brand-new file.
    pub fn generate(&self, task: &str, path: &Path) -> Result<OracleRequest> {
        let template = self.env.get_template("generate")?;
        let prompt = template.render(context! {
            task => task.trim(),
            path => path.display().to_string(),
        })?;
        Ok(OracleRequest {
            purpose: OraclePurpose::Generate,
            system: CODER_SYSTEM.to_string(),
            prompt,
        })
    }

    /// Repair request carrying the failing code and what it printed.
    pub fn repair(
        &self,
        task: &str,
        path: &Path,
        code: &str,
        diagnostic: &str,
    ) -> Result<OracleRequest> {
        let template = self.env.get_template("repair")?;
        let prompt = template.render(context! {
            task => task.trim(),
            path => path.display().to_string(),
            code => code,
            diagnostic => clip_tail(diagnostic.trim(), self.diagnostic_budget_bytes),
        })?;
        Ok(OracleRequest {
            purpose: OraclePurpose::Repair,
            system: CODER_SYSTEM.to_string(),
            prompt,
        })
    }
}

/// Keep the last `budget` bytes of `text`; the end of a traceback is what matters.
fn clip_tail(text: &str, budget: usize) -> String {
    if text.len() <= budget {
        return text.to_string();
    }
    let mut start = text.len() - budget;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    debug!(
        before_len = text.len(),
        after_len = text.len() - start,
        "clipped diagnostic for budget"
    );
    format!("[truncated {start} bytes]\n{}", &text[start..])
}
