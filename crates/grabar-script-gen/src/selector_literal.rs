//! Selector literal compiler.
//!
//! Turns an element's ordered candidate selector strings into the literal
//! array expression the runtime resolver consumes. Each candidate is parsed
//! into a tagged [`SelectorSpec`] and rendered as a tagged object literal;
//! candidates that do not parse are dropped from the array and reported so
//! the caller can attach a diagnostic.

use grabar::model::Element;
use grabar::selector::SelectorSpec;

use crate::literal::escape_line_separators;

/// A compiled candidate array plus the candidates that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateArray {
    /// JavaScript array expression of tagged selector objects
    pub expression: String,
    /// Parse failures, one message per dropped candidate
    pub dropped: Vec<String>,
}

/// Compile one element's candidates into a literal array expression.
#[must_use]
pub fn candidates_literal(element: &Element) -> CandidateArray {
    let mut rendered = Vec::new();
    let mut dropped = Vec::new();
    for candidate in &element.selectors {
        match SelectorSpec::parse(&candidate.value) {
            Ok(spec) => rendered.push(spec_literal(&spec)),
            Err(err) => dropped.push(format!("selector '{}': {err}", candidate.value)),
        }
    }
    CandidateArray {
        expression: format!("[{}]", rendered.join(", ")),
        dropped,
    }
}

/// One tagged selector object literal. Serialized directly so fields keep
/// their declared order (`kind` tag first).
#[must_use]
pub fn spec_literal(spec: &SelectorSpec) -> String {
    serde_json::to_string(spec)
        .map_or_else(|_| "null".to_string(), escape_line_separators)
}

/// The canonical locator call chain for a selector, rooted at a page
/// variable. Used where the generated code needs a plain locator rather
/// than a resolved target (e.g. count assertions).
#[must_use]
pub fn locator_chain(page_var: &str, spec: &SelectorSpec) -> String {
    format!("{page_var}.{spec}")
}
