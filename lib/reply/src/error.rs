//! Error types for the reply crate.

use larn_relay_core::{PersistenceError, UserId};
use std::fmt;

/// Errors from pending-overflow operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverflowError {
    /// Appending the remainder failed; the units were not queued.
    StoreFailed {
        user_id: UserId,
        source: PersistenceError,
    },
    /// Reading the queue failed; nothing was consumed.
    ReadFailed {
        user_id: UserId,
        source: PersistenceError,
    },
    /// Dropping the whole queue failed.
    ClearFailed {
        user_id: UserId,
        source: PersistenceError,
    },
}

impl fmt::Display for OverflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreFailed { user_id, source } => {
                write!(f, "failed to queue overflow for {user_id}: {source}")
            }
            Self::ReadFailed { user_id, source } => {
                write!(f, "failed to read overflow for {user_id}: {source}")
            }
            Self::ClearFailed { user_id, source } => {
                write!(f, "failed to clear overflow for {user_id}: {source}")
            }
        }
    }
}

impl std::error::Error for OverflowError {}
