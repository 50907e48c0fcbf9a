//! Conversation state and topic tracking.
//!
//! The completion backend tags every response with an opaque classification.
//! When the tag differs from the stored one the user has switched topic: the
//! new tag is persisted first, then the user's history is cleared, and only
//! after both succeed may turns of the current interaction be recorded.

use crate::error::ConversationError;
use crate::history::HistoryStore;
use async_trait::async_trait;
use larn_relay_core::{PersistenceError, UserId};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Opaque topic/agent tag supplied by the completion backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Classification(String);

impl Classification {
    /// Wraps a backend-supplied tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the raw tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The per-user document's conversation fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// The active topic; `None` until the first completion.
    pub current_classification: Option<Classification>,
}

/// Storage for the per-user document.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the user's document, or `None` if it does not exist.
    async fn load_state(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ConversationState>, PersistenceError>;

    /// Creates or overwrites the stored classification.
    async fn save_classification(
        &self,
        user_id: &UserId,
        classification: &Classification,
    ) -> Result<(), PersistenceError>;

    /// Creates an empty document if none exists; returns true if created.
    async fn ensure_user(&self, user_id: &UserId) -> Result<bool, PersistenceError>;

    /// Deletes the user's document. Missing documents are not an error.
    async fn delete_user(&self, user_id: &UserId) -> Result<(), PersistenceError>;
}

/// Outcome of evaluating a classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicChange {
    /// Same tag as stored; nothing changed.
    Unchanged,
    /// No tag was stored yet; the new one was saved, history kept.
    First,
    /// The tag changed; the new one was saved and history cleared.
    Switched {
        previous: Classification,
        cleared_turns: u64,
    },
}

impl TopicChange {
    /// Returns true if history was reset.
    #[must_use]
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Switched { .. })
    }
}

/// Applies the history-reset policy.
///
/// `evaluate` is a read-modify-write; callers serialize it per user (see
/// [`crate::ConversationCoordinator`]).
#[derive(Clone)]
pub struct ConversationStateManager {
    states: Arc<dyn StateStore>,
    history: Arc<dyn HistoryStore>,
}

impl ConversationStateManager {
    /// Creates a manager over the given stores.
    pub fn new(states: Arc<dyn StateStore>, history: Arc<dyn HistoryStore>) -> Self {
        Self { states, history }
    }

    /// Compares `classification` to the stored tag and resets history on change.
    ///
    /// # Errors
    ///
    /// Fails if the state cannot be read, the new tag cannot be saved (history
    /// is then untouched), or history cannot be cleared after the save.
    #[instrument(skip_all, fields(user_id = %user_id, classification = %classification))]
    pub async fn evaluate(
        &self,
        user_id: &UserId,
        classification: &Classification,
    ) -> Result<TopicChange, Report<ConversationError>> {
        let stored = self
            .states
            .load_state(user_id)
            .await
            .map_err(|source| ConversationError::LoadStateFailed {
                user_id: user_id.clone(),
                source,
            })?
            .and_then(|state| state.current_classification);

        let previous = match stored {
            Some(current) if &current == classification => return Ok(TopicChange::Unchanged),
            other => other,
        };

        self.states
            .save_classification(user_id, classification)
            .await
            .map_err(|source| ConversationError::SaveClassificationFailed {
                user_id: user_id.clone(),
                source,
            })?;

        let Some(previous) = previous else {
            debug!("stored first classification");
            return Ok(TopicChange::First);
        };

        let cleared_turns = self.history.clear_history(user_id).await.map_err(|source| {
            ConversationError::ClearHistoryFailed {
                user_id: user_id.clone(),
                source,
            }
        })?;

        info!(%previous, cleared_turns, "topic changed, history reset");
        Ok(TopicChange::Switched {
            previous,
            cleared_turns,
        })
    }

    /// Creates the user's document on first follow.
    ///
    /// # Errors
    ///
    /// Fails if the store rejects the write.
    pub async fn register(&self, user_id: &UserId) -> Result<bool, Report<ConversationError>> {
        let created = self.states.ensure_user(user_id).await.map_err(|source| {
            ConversationError::UserDocumentFailed {
                user_id: user_id.clone(),
                source,
            }
        })?;
        Ok(created)
    }

    /// Deletes the user's document and history.
    ///
    /// # Errors
    ///
    /// Fails on the first store error; the document is deleted before history.
    pub async fn forget(&self, user_id: &UserId) -> Result<u64, Report<ConversationError>> {
        self.states.delete_user(user_id).await.map_err(|source| {
            ConversationError::UserDocumentFailed {
                user_id: user_id.clone(),
                source,
            }
        })?;

        let cleared = self.history.clear_history(user_id).await.map_err(|source| {
            ConversationError::ClearHistoryFailed {
                user_id: user_id.clone(),
                source,
            }
        })?;
        Ok(cleared)
    }
}
