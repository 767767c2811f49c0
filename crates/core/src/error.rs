//! Error types for fieldsift operations.
//!
//! Only fetching, file access and configuration loading can fail. Tokenizing,
//! row accumulation, classification and windowing are total functions: every
//! input, however malformed or empty, produces a value. There is therefore no
//! "malformed markup" or "nothing extracted" variant here.
//!
//! # Example
//!
//! ```rust
//! use fieldsift_core::{FieldsiftError, Result};
//!
//! fn require_url(url: &str) -> Result<&str> {
//!     if url.is_empty() {
//!         return Err(FieldsiftError::InvalidUrl("empty".to_string()));
//!     }
//!     Ok(url)
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for fieldsift.
#[derive(Error, Debug)]
pub enum FieldsiftError {
    /// Transport-level failure from reqwest (DNS, connection reset, TLS).
    #[cfg(feature = "fetch")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The fetch did not complete within its deadline.
    #[error("Request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// The remote answered with a non-2xx status.
    #[error("Upstream responded with status {status}")]
    UpstreamError { status: u16 },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Result serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// A site profile or configuration file is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Other I/O errors (stdin, file reads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for FieldsiftError {
    fn from(err: serde_json::Error) -> Self {
        FieldsiftError::Serialization(err.to_string())
    }
}

/// Result type alias for FieldsiftError.
pub type Result<T> = std::result::Result<T, FieldsiftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FieldsiftError::InvalidUrl("not a url".to_string());
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_timeout_error() {
        let err = FieldsiftError::Timeout { timeout_ms: 2500 };
        assert!(err.to_string().contains("2500"));
    }

    #[test]
    fn test_upstream_error() {
        let err = FieldsiftError::UpstreamError { status: 503 };
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_from_serde_json() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = FieldsiftError::from(parse_err);
        assert!(matches!(err, FieldsiftError::Serialization(_)));
    }
}
