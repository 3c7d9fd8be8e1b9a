//! Lexical resolution of plan targets against the logical working directory.

use std::path::{Component, Path, PathBuf};

/// Resolve `target` against `current`.
///
/// Absolute targets are taken as-is, a leading `~` expands to `home` when one is known,
/// and `.`/`..` components are folded without touching the filesystem.
pub fn resolve_target(current: &Path, target: &str, home: Option<&Path>) -> PathBuf {
    let target = target.trim().trim_matches(|c: char| c == '"' || c == '\'');
    let joined = match (target.strip_prefix('~'), home) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/'))
        }
        _ => current.join(target),
    };
    normalize(&joined)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
