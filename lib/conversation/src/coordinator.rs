//! Post-reply commit of one interaction.
//!
//! Once a reply has been delivered, the interaction is committed off the
//! request path: the classification is evaluated (possibly resetting history)
//! and then the user and model turns are appended. Both steps run under the
//! user's lock so that a reset never interleaves with another interaction's
//! turns.

use crate::error::ConversationError;
use crate::history::{HistoryRecorder, HistoryStore, RecordedExchange};
use crate::state::{Classification, ConversationStateManager, StateStore, TopicChange};
use crate::turn::Turn;
use larn_relay_core::{UserId, UserLocks};
use rootcause::Report;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info_span};

/// Everything needed to commit one interaction, captured by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub user_id: UserId,
    pub user_text: String,
    pub model_text: String,
    pub classification: Classification,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub topic: TopicChange,
    pub exchange: RecordedExchange,
}

/// Handle to a background commit.
pub type CommitHandle = JoinHandle<Result<Committed, Report<ConversationError>>>;

/// Serializes per-user state changes and history writes.
#[derive(Clone)]
pub struct ConversationCoordinator {
    state: ConversationStateManager,
    recorder: HistoryRecorder,
    locks: UserLocks,
}

impl ConversationCoordinator {
    /// Creates a coordinator over the given stores.
    pub fn new(states: Arc<dyn StateStore>, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            state: ConversationStateManager::new(states, history.clone()),
            recorder: HistoryRecorder::new(history),
            locks: UserLocks::new(),
        }
    }

    /// Reads the user's history, waiting for any in-flight commit.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot be read.
    pub async fn history(&self, user_id: &UserId) -> Result<Vec<Turn>, Report<ConversationError>> {
        let _guard = self.locks.lock(user_id).await;
        self.recorder.history(user_id).await
    }

    /// Evaluates the classification, then records the exchange.
    ///
    /// Turns are not written unless evaluation succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first failing step.
    pub async fn commit(
        &self,
        interaction: &Interaction,
    ) -> Result<Committed, Report<ConversationError>> {
        let user_id = &interaction.user_id;
        let _guard = self.locks.lock(user_id).await;

        let topic = self
            .state
            .evaluate(user_id, &interaction.classification)
            .await?;
        let exchange = self
            .recorder
            .record(user_id, &interaction.user_text, &interaction.model_text)
            .await?;

        Ok(Committed { topic, exchange })
    }

    /// Runs [`commit`](Self::commit) on a background task.
    ///
    /// Failures are logged by the task; the handle also yields them.
    pub fn spawn_commit(&self, interaction: Interaction) -> CommitHandle {
        let coordinator = self.clone();
        let span = info_span!("commit", user_id = %interaction.user_id);

        tokio::spawn(
            async move {
                let result = coordinator.commit(&interaction).await;
                if let Err(e) = &result {
                    error!(error = %e, "Failed to commit interaction");
                }
                result
            }
            .instrument(span),
        )
    }

    /// Waits for a background commit, turning a lost task into an error.
    ///
    /// # Errors
    ///
    /// Returns the commit's own error, or `CommitAborted` if the task
    /// panicked or was cancelled.
    pub async fn join(
        user_id: &UserId,
        handle: CommitHandle,
    ) -> Result<Committed, Report<ConversationError>> {
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(ConversationError::CommitAborted {
                user_id: user_id.clone(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    /// Creates the user's document.
    ///
    /// # Errors
    ///
    /// Fails if the store rejects the write.
    pub async fn register(&self, user_id: &UserId) -> Result<bool, Report<ConversationError>> {
        let _guard = self.locks.lock(user_id).await;
        self.state.register(user_id).await
    }

    /// Deletes the user's document and history.
    ///
    /// # Errors
    ///
    /// Fails on the first store error.
    pub async fn forget(&self, user_id: &UserId) -> Result<u64, Report<ConversationError>> {
        let _guard = self.locks.lock(user_id).await;
        self.state.forget(user_id).await
    }
}
