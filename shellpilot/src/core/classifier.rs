//! Deterministic classification of plan lines.
//!
//! The oracle is asked for one shell command per line but may wrap its answer in
//! fences or add commentary. Every line falls into exactly one [`Classified`]
//! shape; anything unrecognized is treated as a shell command. The recognized
//! shapes are the closed sets declared below.

use std::fmt;

/// File extensions that mark a bare path as a file to create.
pub const RECOGNIZED_EXTENSIONS: &[&str] = &[
    "js", "ts", "json", "jsx", "tsx", "py", "sh", "html", "css",
];

/// Utilities whose invocation means "create this file".
pub const CREATION_UTILITIES: &[&str] = &["touch"];

/// Dev-server invocations that never terminate on their own.
pub const LONG_RUNNING_COMMANDS: &[&str] = &["npm run dev", "yarn dev", "pnpm dev"];

const FENCE_MARKER: &str = "```";
const DIRECTORY_CHANGE_PREFIX: &str = "cd ";

/// Shape of a single plan line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// Blank line, comment, fence, or bare `bash` language tag.
    Skip,
    /// `cd <target>`; the target is not yet resolved.
    DirectoryChange(String),
    /// A file the artifact generator should produce at this (unresolved) path.
    FileCreation(String),
    /// Anything else, executed verbatim.
    ShellCommand,
}

impl fmt::Display for Classified {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classified::Skip => f.write_str("skip"),
            Classified::DirectoryChange(target) => write!(f, "cd {target}"),
            Classified::FileCreation(path) => write!(f, "create {path}"),
            Classified::ShellCommand => f.write_str("shell"),
        }
    }
}

/// Classify one line of plan text.
///
/// Checks run in a fixed order: skip, directory change, file creation, shell.
pub fn classify(line: &str) -> Classified {
    let line = line.trim();
    if is_skip(line) {
        return Classified::Skip;
    }
    if let Some(target) = line.strip_prefix(DIRECTORY_CHANGE_PREFIX) {
        return Classified::DirectoryChange(target.trim().to_string());
    }
    if is_file_creation(line) {
        return Classified::FileCreation(creation_path(line));
    }
    Classified::ShellCommand
}

/// Whether `line` contains any deny-listed long-running invocation.
pub fn is_long_running<S: AsRef<str>>(line: &str, deny_list: &[S]) -> bool {
    deny_list
        .iter()
        .map(AsRef::as_ref)
        .filter(|entry| !entry.is_empty())
        .any(|entry| line.contains(entry))
}

/// Candidate commands extracted from one plan, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanLines {
    /// Trimmed lines to dispatch. Duplicates are kept; history dedup happens later.
    pub candidates: Vec<String>,
    /// Lines dropped because they match the long-running deny-list.
    pub long_running: Vec<String>,
}

/// Split plan text into dispatchable candidates, dropping skipped and long-running lines.
pub fn candidate_commands<S: AsRef<str>>(plan: &str, deny_list: &[S]) -> PlanLines {
    let mut lines = PlanLines::default();
    for raw in plan.lines() {
        let line = raw.trim();
        if classify(line) == Classified::Skip {
            continue;
        }
        if is_long_running(line, deny_list) {
            lines.long_running.push(line.to_string());
            continue;
        }
        lines.candidates.push(line.to_string());
    }
    lines
}

fn is_skip(line: &str) -> bool {
    line.is_empty()
        || line.starts_with('#')
        || line.starts_with(FENCE_MARKER)
        || line.eq_ignore_ascii_case("bash")
}

fn is_file_creation(line: &str) -> bool {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let bare_path = tokens.len() == 1 && has_recognized_extension(tokens[0]);
    bare_path
        || tokens.iter().any(|token| CREATION_UTILITIES.contains(token))
        || tokens.iter().any(|token| is_redirection(token))
}

fn has_recognized_extension(token: &str) -> bool {
    let name = token.rsplit('/').next().unwrap_or(token);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => RECOGNIZED_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

fn is_redirection(token: &str) -> bool {
    token.starts_with('>')
}

/// Target of the last `>`/`>>` redirection, else the last token that is not a descriptor
/// redirection like `2>&1`; without shell quoting.
fn creation_path(line: &str) -> String {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let redirected = tokens.iter().enumerate().rev().find_map(|(idx, token)| {
        if !is_redirection(token) {
            return None;
        }
        match token.trim_start_matches('>') {
            "" => tokens.get(idx + 1).copied(),
            inline => Some(inline),
        }
    });
    redirected
        .or_else(|| tokens.iter().rev().find(|token| !token.contains('>')).copied())
        .unwrap_or_default()
        .trim_start_matches('>')
        .trim_matches(|c: char| c == '"' || c == '\'' || c == ';')
        .to_string()
}
