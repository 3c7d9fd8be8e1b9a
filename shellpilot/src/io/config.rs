//! Pilot configuration stored in `shellpilot.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::classifier::LONG_RUNNING_COMMANDS;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "shellpilot.toml";

/// Pilot configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to the values a
/// single interactive run needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PilotConfig {
    /// Planning attempts per session before giving up.
    pub max_attempts: u32,

    /// Repair cycles per generated artifact before giving up on it.
    pub max_repairs: u32,

    /// Deadline for each shell command, in seconds.
    pub command_timeout_secs: u64,

    /// Deadline for each artifact validation run, in seconds.
    pub artifact_timeout_secs: u64,

    /// Keep at most this many bytes of each captured stream.
    pub output_limit_bytes: usize,

    /// Commands that never terminate on their own; matching plan lines are dropped.
    pub long_running: Vec<String>,

    /// Reported to the planner as the project root when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,

    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,

    pub model: String,

    /// Environment variable that holds the API credential.
    pub api_key_env: String,

    /// HTTP timeout for one completion, in seconds.
    pub timeout_secs: u64,

    pub temperature: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
            temperature: 0.2,
        }
    }
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_repairs: 3,
            command_timeout_secs: 10 * 60,
            artifact_timeout_secs: 60,
            output_limit_bytes: 100_000,
            long_running: LONG_RUNNING_COMMANDS
                .iter()
                .map(|cmd| cmd.to_string())
                .collect(),
            project_root: None,
            oracle: OracleConfig::default(),
        }
    }
}

impl PilotConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.artifact_timeout_secs == 0 {
            return Err(anyhow!("artifact_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.long_running.iter().any(|cmd| cmd.trim().is_empty()) {
            return Err(anyhow!("long_running entries must be non-empty"));
        }
        if self.oracle.base_url.trim().is_empty() {
            return Err(anyhow!("oracle.base_url must be non-empty"));
        }
        if self.oracle.model.trim().is_empty() {
            return Err(anyhow!("oracle.model must be non-empty"));
        }
        if self.oracle.api_key_env.trim().is_empty() {
            return Err(anyhow!("oracle.api_key_env must be non-empty"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(anyhow!("oracle.timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_secs(self.artifact_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PilotConfig::default()`.
pub fn load_config(path: &Path) -> Result<PilotConfig> {
    if !path.exists() {
        let cfg = PilotConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PilotConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PilotConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
