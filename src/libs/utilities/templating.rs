//! `{{placeholder}}` substitution for command arguments and artifact templates.

use std::collections::BTreeMap;

/// Result of rendering one string.
#[derive(Debug, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Placeholder names with no value; they are left verbatim in `text`.
    pub unknown: Vec<String>,
}

/// Replaces every `{{name}}` (inner whitespace allowed) with `vars[name]`.
///
/// An unterminated `{{` is copied through as-is.
pub fn render(template: &str, vars: &BTreeMap<String, String>) -> Rendered {
    render_with(template, vars, str::to_string)
}

/// Like [`render`], for text that a shell will parse: every substituted value
/// becomes a single shell word.
pub fn render_shell(template: &str, vars: &BTreeMap<String, String>) -> Rendered {
    render_with(template, vars, shell_quote)
}

/// Quotes `word` for POSIX `sh` unless it only holds characters the shell
/// never splits or expands.
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

fn render_with(template: &str, vars: &BTreeMap<String, String>, escape: fn(&str) -> String) -> Rendered {
    let mut text = String::with_capacity(template.len());
    let mut unknown = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        text.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            text.push_str(&rest[start..]);
            return Rendered { text, unknown };
        };
        let name = after_open[..end].trim();
        match vars.get(name) {
            Some(value) => text.push_str(&escape(value)),
            None => {
                text.push_str(&rest[start..start + 2 + end + 2]);
                unknown.push(name.to_string());
            }
        }
        rest = &after_open[end + 2..];
    }
    text.push_str(rest);
    Rendered { text, unknown }
}
