//! Tagged selector variants and the recorded-string grammar.
//!
//! Recorded candidate selectors arrive as opaque Playwright-style call
//! expressions (`locator('#x')`, `getByRole('button', { name: 'Save' })`,
//! possibly chained one level: `locator('#form').getByText('Save')`).
//! Instead of evaluating those strings, [`SelectorSpec::parse`] maps them
//! onto a closed set of constructors; every consumer dispatches on the tag.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::result::{GrabarError, GrabarResult};

/// A parsed selector with a closed constructor set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectorSpec {
    /// Direct CSS query
    Css {
        /// CSS selector text
        value: String,
    },
    /// `data-testid` attribute lookup
    TestId {
        /// Test id value
        value: String,
    },
    /// Accessible-role lookup with optional accessible name
    Role {
        /// ARIA role
        role: String,
        /// Accessible name filter
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Visible-text lookup (exact match preferred, else substring)
    Text {
        /// Text to match
        value: String,
    },
    /// Label-association lookup
    Label {
        /// Label text
        value: String,
    },
    /// Placeholder attribute lookup
    Placeholder {
        /// Placeholder text
        value: String,
    },
    /// Image alt-text lookup
    AltText {
        /// Alt text
        value: String,
    },
    /// Title attribute lookup
    Title {
        /// Title text
        value: String,
    },
    /// Two-level parent→child composition
    Child {
        /// Scope selector
        parent: Box<SelectorSpec>,
        /// Selector evaluated inside the scope
        child: Box<SelectorSpec>,
    },
}

impl SelectorSpec {
    /// Parse a recorded Playwright-style call expression.
    ///
    /// A leading `page.` receiver is tolerated. Chains fold left into
    /// nested [`SelectorSpec::Child`] compositions.
    ///
    /// # Errors
    ///
    /// Returns [`GrabarError::SelectorParse`] on an empty expression, an
    /// unknown method, or malformed arguments.
    pub fn parse(input: &str) -> GrabarResult<Self> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix("page.").unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(parse_error(input, "empty selector expression"));
        }

        let calls = split_calls(trimmed).map_err(|reason| parse_error(input, reason))?;
        let mut specs = Vec::with_capacity(calls.len());
        for (method, args) in calls {
            specs.push(spec_from_call(input, &method, &args)?);
        }

        specs
            .into_iter()
            .reduce(|parent, child| Self::Child {
                parent: Box::new(parent),
                child: Box::new(child),
            })
            .ok_or_else(|| parse_error(input, "no selector calls found"))
    }

    /// Parse an ordered candidate list, skipping entries that fail to parse.
    ///
    /// Candidate lists come straight from recordings; a single corrupt entry
    /// must not invalidate its healthy siblings.
    #[must_use]
    pub fn parse_candidates(values: &[String]) -> Vec<Self> {
        values
            .iter()
            .filter_map(|v| match Self::parse(v) {
                Ok(spec) => Some(spec),
                Err(err) => {
                    tracing::warn!(candidate = %v, %err, "skipping unparseable selector candidate");
                    None
                }
            })
            .collect()
    }

    /// Short tag name for logs and failure messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Css { .. } => "css",
            Self::TestId { .. } => "test_id",
            Self::Role { .. } => "role",
            Self::Text { .. } => "text",
            Self::Label { .. } => "label",
            Self::Placeholder { .. } => "placeholder",
            Self::AltText { .. } => "alt_text",
            Self::Title { .. } => "title",
            Self::Child { .. } => "child",
        }
    }
}

impl fmt::Display for SelectorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css { value } => write!(f, "locator('{}')", escape_single(value)),
            Self::TestId { value } => write!(f, "getByTestId('{}')", escape_single(value)),
            Self::Role { role, name } => match name {
                Some(n) => write!(
                    f,
                    "getByRole('{}', {{ name: '{}' }})",
                    escape_single(role),
                    escape_single(n)
                ),
                None => write!(f, "getByRole('{}')", escape_single(role)),
            },
            Self::Text { value } => write!(f, "getByText('{}')", escape_single(value)),
            Self::Label { value } => write!(f, "getByLabel('{}')", escape_single(value)),
            Self::Placeholder { value } => {
                write!(f, "getByPlaceholder('{}')", escape_single(value))
            }
            Self::AltText { value } => write!(f, "getByAltText('{}')", escape_single(value)),
            Self::Title { value } => write!(f, "getByTitle('{}')", escape_single(value)),
            Self::Child { parent, child } => write!(f, "{parent}.{child}"),
        }
    }
}

fn parse_error(input: &str, reason: impl Into<String>) -> GrabarError {
    GrabarError::SelectorParse {
        input: input.to_string(),
        reason: reason.into(),
    }
}

fn escape_single(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Split `a('x').b('y')` into `[("a", "'x'"), ("b", "'y'")]`, respecting
/// quoted strings and nested braces inside argument lists.
fn split_calls(input: &str) -> Result<Vec<(String, String)>, String> {
    let mut calls = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        // method name
        let name_start = i;
        while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
            i += 1;
        }
        if i == name_start {
            return Err(format!("expected method name at offset {i}"));
        }
        let method: String = chars[name_start..i].iter().collect();

        if i >= chars.len() || chars[i] != '(' {
            return Err(format!("expected '(' after '{method}'"));
        }
        i += 1;

        // argument list until the matching close paren
        let args_start = i;
        let mut depth = 1usize;
        let mut quote: Option<char> = None;
        while i < chars.len() {
            let c = chars[i];
            match quote {
                Some(q) => {
                    if c == '\\' {
                        i += 1; // skip the escaped character
                    } else if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '\'' | '"' => quote = Some(c),
                    '(' | '{' | '[' => depth += 1,
                    ')' | '}' | ']' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                },
            }
            i += 1;
        }
        if depth != 0 {
            return Err(format!("unterminated argument list in '{method}'"));
        }
        let args: String = chars[args_start..i].iter().collect();
        i += 1; // consume ')'
        calls.push((method, args));

        if i < chars.len() {
            if chars[i] != '.' {
                return Err(format!("expected '.' between calls, found '{}'", chars[i]));
            }
            i += 1;
        }
    }

    Ok(calls)
}

fn spec_from_call(input: &str, method: &str, args: &str) -> GrabarResult<SelectorSpec> {
    let first = first_quoted(args)
        .ok_or_else(|| parse_error(input, format!("'{method}' needs a quoted argument")))?;

    match method {
        "locator" => Ok(SelectorSpec::Css { value: first }),
        "getByTestId" => Ok(SelectorSpec::TestId { value: first }),
        "getByText" => Ok(SelectorSpec::Text { value: first }),
        "getByLabel" => Ok(SelectorSpec::Label { value: first }),
        "getByPlaceholder" => Ok(SelectorSpec::Placeholder { value: first }),
        "getByAltText" => Ok(SelectorSpec::AltText { value: first }),
        "getByTitle" => Ok(SelectorSpec::Title { value: first }),
        "getByRole" => Ok(SelectorSpec::Role {
            role: first,
            name: role_name_option(args),
        }),
        other => Err(parse_error(input, format!("unknown method '{other}'"))),
    }
}

/// Extract the first quoted string from an argument list, unescaping it.
fn first_quoted(args: &str) -> Option<String> {
    quoted_at(args, 0).map(|(s, _)| s)
}

/// Extract the `name:` option value from a `getByRole` options object.
fn role_name_option(args: &str) -> Option<String> {
    let brace = args.find('{')?;
    let options = &args[brace..];
    let key = options.find("name")?;
    let after_key = &options[key + "name".len()..];
    let colon = after_key.find(':')?;
    quoted_at(after_key, colon).map(|(s, _)| s)
}

/// Scan for a quoted string at or after `from`; returns the unescaped value
/// and the offset one past its closing quote.
fn quoted_at(s: &str, from: usize) -> Option<(String, usize)> {
    let chars: Vec<char> = s.chars().collect();
    let mut i = from;
    while i < chars.len() && chars[i] != '\'' && chars[i] != '"' {
        i += 1;
    }
    if i >= chars.len() {
        return None;
    }
    let quote = chars[i];
    i += 1;
    let mut out = String::new();
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                let next = chars[i + 1];
                out.push(match next {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    c => c,
                });
                i += 2;
            }
            c if c == quote => return Some((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    None
}
