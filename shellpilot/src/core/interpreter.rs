//! Runnable vs. static classification of generated artifacts.

use std::path::Path;

/// How the runtime validator should treat a written artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Executed as `<program> <file>` to check it works.
    Runnable { program: &'static str },
    /// Written only; there is nothing to execute (markup, styles, data, typed sources).
    Static,
}

const INTERPRETERS: &[(&str, &str)] = &[("py", "python3"), ("js", "node"), ("sh", "sh")];

/// Pick the interpreter implied by the file extension, if any.
pub fn artifact_kind(path: &Path) -> ArtifactKind {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return ArtifactKind::Static;
    };
    INTERPRETERS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map_or(ArtifactKind::Static, |&(_, program)| ArtifactKind::Runnable {
            program,
        })
}
