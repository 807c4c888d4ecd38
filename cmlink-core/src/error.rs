//! Structured error types for the cmlink crates.

use thiserror::Error;

/// Unified error type for all cmlink operations.
#[derive(Debug, Error)]
pub enum CmLinkError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed model file)
    #[error("parse error: {0}")]
    Parse(String),

    /// A covariance model violates a structural invariant
    #[error("malformed model: {0}")]
    ModelShape(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A broken internal invariant, e.g. a joint table holding a witness
    /// of the wrong shape for its algebra
    #[error("internal error: {0}")]
    Internal(String),
}

impl CmLinkError {
    /// Attach a 1-based line number to a parse error message.
    pub fn parse_at(line: usize, msg: impl Into<String>) -> Self {
        CmLinkError::Parse(format!("line {}: {}", line, msg.into()))
    }
}

/// Convenience alias used throughout the cmlink crates.
pub type Result<T> = std::result::Result<T, CmLinkError>;
