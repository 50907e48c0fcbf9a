//! Error types for the AI crate.

use std::fmt;

/// Errors from the completion backend.
///
/// All of these are upstream failures; callers reply with a fixed apology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The backend could not be reached.
    Unreachable { reason: String },
    /// No response arrived within the configured timeout.
    Timeout,
    /// The backend answered with a non-success status.
    UpstreamStatus { status: u16, body: String },
    /// The response body was not the expected JSON.
    ResponseParseFailed { reason: String },
    /// The client could not be constructed.
    InvalidConfig { reason: String },
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { reason } => {
                write!(f, "completion backend unreachable: {reason}")
            }
            Self::Timeout => write!(f, "completion backend timed out"),
            Self::UpstreamStatus { status, body } => {
                write!(f, "completion backend returned {status}: {body}")
            }
            Self::ResponseParseFailed { reason } => {
                write!(f, "failed to parse completion response: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid completion backend configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for CompletionError {}
