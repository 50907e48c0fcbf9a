//! Conversation memory for the larn-relay chat relay.
//!
//! This crate provides:
//!
//! - **Turns**: the ordered user/model exchanges fed back to the backend
//! - **State manager**: per-user classification tracking and history reset
//! - **History recorder**: order-preserving persistence of exchanges
//! - **Coordinator**: the background task that commits one interaction

pub mod coordinator;
pub mod error;
pub mod history;
pub mod state;
pub mod turn;

#[cfg(test)]
mod testing;

pub use coordinator::{CommitHandle, Committed, ConversationCoordinator, Interaction};
pub use error::ConversationError;
pub use history::{HistoryRecorder, HistoryStore, RecordedExchange};
pub use larn_relay_core::UserLocks;
pub use state::{
    Classification, ConversationState, ConversationStateManager, StateStore, TopicChange,
};
pub use turn::{Speaker, Turn};
