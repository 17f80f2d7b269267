//! Error and diagnostic types for `grabar-script-gen`.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for compiler operations.
pub type Result<T> = std::result::Result<T, ScriptGenError>;

/// Errors that can occur around compilation.
///
/// Compilation itself never fails; malformed input degrades to safe
/// defaults and surfaces as [`Diagnostic`]s. These variants cover the
/// fallible edges: persisting output and serializing payloads.
#[derive(Debug, Error)]
pub enum ScriptGenError {
    /// IO error while writing generated output
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One per-step compilation notice.
///
/// The batch contract is no-throw: an action the compiler cannot translate
/// produces an empty fragment and one of these, never an error. Silent
/// omission would mask data-model drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Zero-based position of the offending action in the input array
    pub ordinal: usize,
    /// What the compiler could not do
    pub message: String,
}

impl Diagnostic {
    /// Build a diagnostic for a step.
    #[must_use]
    pub fn new(ordinal: usize, message: impl Into<String>) -> Self {
        Self {
            ordinal,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step {}: {}", self.ordinal, self.message)
    }
}
