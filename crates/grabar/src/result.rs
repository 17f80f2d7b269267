//! Result and error types for Grabar.

use thiserror::Error;

/// Result type for Grabar operations
pub type GrabarResult<T> = Result<T, GrabarError>;

/// Errors that can occur in the runtime support library
#[derive(Debug, Error)]
pub enum GrabarError {
    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// A recorded selector expression could not be parsed
    #[error("Invalid selector expression '{input}': {reason}")]
    SelectorParse {
        /// The offending expression
        input: String,
        /// Why it failed to parse
        reason: String,
    },

    /// No candidate selector matched any element
    #[error("Invalid selectors: none of the {tried} candidates matched")]
    InvalidSelectors {
        /// How many candidates were tried
        tried: usize,
    },

    /// Every candidate selector was tried and the forced action failed on all
    #[error("Forced {action} failed after {attempts} candidates: {last_reason}")]
    ForceActionExhausted {
        /// Action kind that was attempted
        action: String,
        /// Candidates tried
        attempts: usize,
        /// Failure reason of the final attempt
        last_reason: String,
    },

    /// Page-level error from the underlying driver
    #[error("Page error: {message}")]
    PageError {
        /// Error message
        message: String,
    },

    /// Outbound API request descriptor was unusable
    #[error("Invalid API request: {message}")]
    InvalidRequest {
        /// Error message
        message: String,
    },

    /// Screenshot capture failed
    #[error("Screenshot failed: {message}")]
    ScreenshotError {
        /// Error message
        message: String,
    },

    /// Evidence file could not be written
    #[error("Evidence export failed: {message}")]
    EvidenceError {
        /// Error message
        message: String,
    },

    /// HTTP transport error
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Archive error while assembling a workbook
    #[error("Workbook error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
