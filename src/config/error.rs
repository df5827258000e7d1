//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An env var's string value did not parse to the expected numeric type.
    #[error("failed to parse {field} value '{value}': {reason}")]
    ParseFailed {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// `LEXVI_MODE_DEFAULT` held something other than fast/balanced/quality/adaptive.
    #[error("invalid mode '{value}': expected one of fast, balanced, quality, adaptive")]
    InvalidMode { value: String },

    /// A parsed value is out of its valid range (cross-field check in `validate()`).
    #[error("{field} out of range: {reason}")]
    OutOfRange {
        field: &'static str,
        reason: String,
    },
}
