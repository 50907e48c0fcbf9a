//! Completion backend abstraction.

use crate::error::CompletionError;
use async_trait::async_trait;
use larn_relay_conversation::{Classification, Turn};
use rootcause::Report;
use serde::{Deserialize, Serialize};

/// A backend reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Raw response text, still carrying segment and image markers.
    pub response: String,
    /// Topic tag for the conversation.
    pub classification: Classification,
}

/// Trait for completion backends.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Produces a reply to `message` given the prior turns, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable, times out, answers
    /// with a failure status or an unparsable body. There is no retry.
    async fn complete(
        &self,
        message: &str,
        history: &[Turn],
    ) -> Result<Completion, Report<CompletionError>>;

    /// Returns follow-up prompt candidates for `message`, empty ones removed.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`complete`](Self::complete).
    async fn suggest(&self, message: &str) -> Result<Vec<String>, Report<CompletionError>>;
}
