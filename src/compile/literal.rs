// src/compile/literal.rs

//! Helpers that turn untrusted parameter text into inert program text.
//!
//! Everything coming from a plan is either emitted as a quoted string
//! literal, flattened into a single comment line, or reduced to a safe file
//! name component. Nothing is spliced into code unquoted.

use std::fmt::Write;

/// Double-quoted string literal valid in both Python and JSON.
pub fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() || c == '\u{2028}' || c == '\u{2029}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// List literal of quoted strings, e.g. `["a", "b"]`.
pub fn quoted_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| quoted(v)).collect();
    format!("[{}]", items.join(", "))
}

/// Collapse text onto one line so it can sit safely after a `#`.
pub fn comment_text(value: &str) -> String {
    let flat: String = value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    flat.trim().to_string()
}

/// File-name component derived from a column name.
///
/// Keeps `[A-Za-z0-9_-]`, maps everything else to `_`, so the artifact path
/// always stays inside `plots/`.
pub fn file_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_breaks_are_escaped() {
        assert_eq!(quoted("plain"), "\"plain\"");
        assert_eq!(
            quoted("x\")\nimport os"),
            "\"x\\\")\\nimport os\""
        );
        assert_eq!(quoted("a\\b"), "\"a\\\\b\"");
        assert_eq!(quoted("nul\u{0}"), "\"nul\\u0000\"");
    }

    #[test]
    fn lists_are_comma_separated_literals() {
        let cols = vec!["x".to_string(), "y z".to_string()];
        assert_eq!(quoted_list(&cols), "[\"x\", \"y z\"]");
        assert_eq!(quoted_list(&[]), "[]");
    }

    #[test]
    fn comments_cannot_span_lines() {
        assert_eq!(comment_text("Load\nimport os\r\n"), "Load import os");
    }

    #[test]
    fn file_components_stay_inside_directory() {
        assert_eq!(file_component("temp"), "temp");
        assert_eq!(file_component("../etc/passwd"), "___etc_passwd");
        assert_eq!(file_component("a b"), "a_b");
        assert_eq!(file_component(""), "_");
    }
}
