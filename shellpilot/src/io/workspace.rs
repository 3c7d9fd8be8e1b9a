//! Filesystem effects of a plan: directories on demand and artifact writes.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// Create `dir` (and parents) if absent and confirm it is a directory.
pub fn ensure_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        debug!(dir = %dir.display(), "creating directory");
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }
    if !dir.is_dir() {
        return Err(anyhow!("{} exists but is not a directory", dir.display()));
    }
    Ok(())
}

/// Replace the contents of `path`, creating parent directories as needed.
pub fn write_artifact(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create artifact dir {}", parent.display()))?;
    }
    debug!(path = %path.display(), bytes = contents.len(), "writing artifact");
    fs::write(path, contents).with_context(|| format!("write artifact {}", path.display()))
}

pub fn read_artifact(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read artifact {}", path.display()))
}
