//! Flag token extraction from free-form model output

use std::sync::OnceLock;

use regex::Regex;

/// Literal prefix, opening brace, shortest run of anything, closing brace
pub const FLAG_PATTERN: &str = r"flag\{.*?\}";

fn flag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FLAG_PATTERN).expect("flag pattern is a valid regex"))
}

/// Return the first `flag{...}` token in `text`, if any.
///
/// A miss is the normal "not answered yet" signal for the retry loop.
pub fn extract_flag(text: &str) -> Option<&str> {
    flag_regex().find(text).map(|m| m.as_str())
}
