//! Conversation history.
//!
//! Turns are read back in the order they were committed, which the store
//! guarantees through its monotonic sequence. An exchange is always written as
//! the user turn followed by the model turn.

use crate::error::ConversationError;
use crate::turn::{Speaker, Turn};
use async_trait::async_trait;
use larn_relay_core::{PersistenceError, UserId};
use rootcause::Report;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Storage for per-user turn history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends one turn and returns it with its assigned sequence.
    async fn append_turn(
        &self,
        user_id: &UserId,
        speaker: Speaker,
        text: &str,
    ) -> Result<Turn, PersistenceError>;

    /// Returns all of the user's turns, oldest first.
    async fn history(&self, user_id: &UserId) -> Result<Vec<Turn>, PersistenceError>;

    /// Deletes the user's turns, returning how many went.
    async fn clear_history(&self, user_id: &UserId) -> Result<u64, PersistenceError>;
}

/// The two turns written for one interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExchange {
    pub user_turn: Turn,
    pub model_turn: Turn,
}

/// Writes and reads history through a [`HistoryStore`].
#[derive(Clone)]
pub struct HistoryRecorder {
    history: Arc<dyn HistoryStore>,
}

impl HistoryRecorder {
    /// Creates a recorder over the given store.
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self { history }
    }

    /// Appends the user's message, then the model's response.
    ///
    /// # Errors
    ///
    /// Fails on the first append that fails. If the user turn cannot be
    /// written the model turn is not attempted.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn record(
        &self,
        user_id: &UserId,
        user_text: &str,
        model_text: &str,
    ) -> Result<RecordedExchange, Report<ConversationError>> {
        let user_turn = self.append(user_id, Speaker::User, user_text).await?;
        let model_turn = self.append(user_id, Speaker::Model, model_text).await?;

        debug!(
            user_sequence = user_turn.sequence,
            model_sequence = model_turn.sequence,
            "recorded exchange"
        );
        Ok(RecordedExchange {
            user_turn,
            model_turn,
        })
    }

    /// Returns the user's turns, oldest first.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be read.
    pub async fn history(&self, user_id: &UserId) -> Result<Vec<Turn>, Report<ConversationError>> {
        let turns = self.history.history(user_id).await.map_err(|source| {
            ConversationError::LoadHistoryFailed {
                user_id: user_id.clone(),
                source,
            }
        })?;
        Ok(turns)
    }

    async fn append(
        &self,
        user_id: &UserId,
        speaker: Speaker,
        text: &str,
    ) -> Result<Turn, Report<ConversationError>> {
        let turn = self
            .history
            .append_turn(user_id, speaker, text)
            .await
            .map_err(|source| ConversationError::AppendTurnFailed {
                user_id: user_id.clone(),
                speaker,
                source,
            })?;
        Ok(turn)
    }
}
