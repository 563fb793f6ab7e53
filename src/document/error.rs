//! Document error types
//!
//! One taxonomy for every core operation (storage, geometry, stamping),
//! so callers can tell skip-and-continue failures from fatal ones
//! without looking at message strings.

use thiserror::Error;

/// Unified document error type
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Session, document, stamp or result missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Page number outside `[1, page_count]`
    #[error("Invalid page {page}: document has {page_count} pages")]
    InvalidPage { page: usize, page_count: usize },

    /// Upload extension not in the allow-list
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Document or image bytes could not be parsed
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// A single stamp failed to composite
    #[error("Draw failure: {0}")]
    DrawFailure(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error (std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    /// Whether the enclosing operation may skip this failure and continue.
    ///
    /// Only draw failures are recovered locally; a missing stamp is
    /// filtered out before drawing and never reaches this point.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DocumentError::DrawFailure(_))
    }
}

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Alias for Result (used across the crate)
pub type DocumentResult<T> = Result<T>;

impl From<mupdf::Error> for DocumentError {
    fn from(err: mupdf::Error) -> Self {
        DocumentError::DecodeFailure(err.to_string())
    }
}

impl From<lopdf::Error> for DocumentError {
    fn from(err: lopdf::Error) -> Self {
        DocumentError::DecodeFailure(err.to_string())
    }
}

impl From<image::ImageError> for DocumentError {
    fn from(err: image::ImageError) -> Self {
        DocumentError::DecodeFailure(err.to_string())
    }
}
