//! Literal layer: safe embedding of recorded values in generated source.
//!
//! Every recorded string that lands in the output goes through [`js_str`];
//! JSON payloads go through [`json_literal`] (which additionally escapes the
//! line separators JSON allows but JavaScript source does not). The packed
//! `"X:.., Y:.."` convention used by scroll and resize payloads and the
//! cookie `sameSite` normalization live here too.

use serde_json::Value;

/// Render a string as a single-quoted JavaScript literal.
#[must_use]
pub fn js_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Render a JSON value as a JavaScript expression.
///
/// `serde_json` output is valid JavaScript except for U+2028/U+2029, which
/// are legal inside JSON strings but terminate lines in source text.
#[must_use]
pub fn json_literal(value: &Value) -> String {
    escape_line_separators(serde_json::to_string(value).unwrap_or_else(|_| "null".to_string()))
}

/// Escape the separators JSON allows raw but JavaScript source does not.
#[must_use]
pub fn escape_line_separators(rendered: String) -> String {
    rendered
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Extract two labelled integers from a packed `"X: 10, Y: 20"` string.
///
/// Both components default to 0 when their label is absent or the number
/// does not parse; order and spacing are free.
#[must_use]
pub fn parse_packed_pair(packed: &str, first_label: &str, second_label: &str) -> (i64, i64) {
    let component = |label: &str| {
        packed
            .split(',')
            .filter_map(|part| part.split_once(':'))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(label))
            .and_then(|(_, v)| v.trim().parse::<f64>().ok())
            .map_or(0, |v| v as i64)
    };
    (component(first_label), component(second_label))
}

/// Normalize a recorded `sameSite` value to the casing the automation API
/// accepts. Unrecognized values fall back to `Lax`.
#[must_use]
pub fn normalize_same_site(raw: &str) -> &'static str {
    match raw.trim().to_ascii_lowercase().as_str() {
        "strict" => "Strict",
        "none" => "None",
        _ => "Lax",
    }
}
