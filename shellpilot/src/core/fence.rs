//! Removal of Markdown code fences wrapped around oracle output.

use std::sync::LazyLock;

use regex::Regex;

/// Opening fence with an optional language tag. The tag only counts when the fence line
/// ends right after it; otherwise just the backticks are removed.
static OPENER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^```(?:[\w+.#-]*[ \t]*(?:\r?\n|$))?").expect("fence opener regex is valid")
});

const CLOSER: &str = "```";

/// Strip a leading fence opener and a trailing fence closer, then trim whitespace.
///
/// Applied until the text stops changing, so `strip_fences(strip_fences(x)) == strip_fences(x)`
/// holds even for doubly wrapped output.
pub fn strip_fences(text: &str) -> String {
    let mut current = text.trim();
    loop {
        let next = strip_once(current);
        if next == current {
            return next.to_string();
        }
        current = next;
    }
}

fn strip_once(text: &str) -> &str {
    let mut body = text;
    if let Some(found) = OPENER_RE.find(body) {
        body = &body[found.end()..];
    }
    if let Some(stripped) = body.trim_end().strip_suffix(CLOSER) {
        body = stripped;
    }
    body.trim()
}
