//! Error types for the conversation crate.
//!
//! Every variant names the user and the step that failed, and carries the
//! store error that caused it. Nothing here is shown to end users.

use crate::turn::Speaker;
use larn_relay_core::{PersistenceError, UserId};
use std::fmt;

/// Errors from conversation state and history operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// Reading the user's stored state failed.
    LoadStateFailed {
        user_id: UserId,
        source: PersistenceError,
    },
    /// Persisting a new classification failed; history was left untouched.
    SaveClassificationFailed {
        user_id: UserId,
        source: PersistenceError,
    },
    /// The classification changed but clearing history failed.
    ClearHistoryFailed {
        user_id: UserId,
        source: PersistenceError,
    },
    /// Reading history failed.
    LoadHistoryFailed {
        user_id: UserId,
        source: PersistenceError,
    },
    /// Appending a turn failed.
    AppendTurnFailed {
        user_id: UserId,
        speaker: Speaker,
        source: PersistenceError,
    },
    /// Creating or deleting the user document failed.
    UserDocumentFailed {
        user_id: UserId,
        source: PersistenceError,
    },
    /// The background commit task did not run to completion.
    CommitAborted { user_id: UserId, reason: String },
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadStateFailed { user_id, source } => {
                write!(f, "failed to load conversation state for {user_id}: {source}")
            }
            Self::SaveClassificationFailed { user_id, source } => {
                write!(f, "failed to save classification for {user_id}: {source}")
            }
            Self::ClearHistoryFailed { user_id, source } => {
                write!(f, "failed to clear history for {user_id}: {source}")
            }
            Self::LoadHistoryFailed { user_id, source } => {
                write!(f, "failed to load history for {user_id}: {source}")
            }
            Self::AppendTurnFailed {
                user_id,
                speaker,
                source,
            } => {
                write!(f, "failed to append {speaker} turn for {user_id}: {source}")
            }
            Self::UserDocumentFailed { user_id, source } => {
                write!(f, "user document operation failed for {user_id}: {source}")
            }
            Self::CommitAborted { user_id, reason } => {
                write!(f, "commit for {user_id} aborted: {reason}")
            }
        }
    }
}

impl std::error::Error for ConversationError {}
