//! Error handling foundation for larn-relay.
//!
//! This module provides the `Result` type alias using rootcause, plus the
//! single error type every persistence trait returns. Each crate defines its
//! own domain-specific errors and maps store failures into them as they
//! propagate toward the request boundary.

use rootcause::Report;
use std::fmt;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

/// Failures reported by a persistence backend.
///
/// Store implementations (Postgres, in-memory) flatten their native errors
/// into these variants so the traits stay backend-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Reading a document or collection failed.
    ReadFailed { reason: String },
    /// Writing or appending failed.
    WriteFailed { reason: String },
    /// Deleting a document, entry or collection failed.
    DeleteFailed { reason: String },
    /// Stored data could not be decoded.
    Corrupt { reason: String },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { reason } => write!(f, "store read failed: {reason}"),
            Self::WriteFailed { reason } => write!(f, "store write failed: {reason}"),
            Self::DeleteFailed { reason } => write!(f, "store delete failed: {reason}"),
            Self::Corrupt { reason } => write!(f, "stored data is corrupt: {reason}"),
        }
    }
}

impl std::error::Error for PersistenceError {}
