//! Core domain types and utilities for the larn-relay chat relay.
//!
//! This crate provides the identifiers, error foundations and per-user locks
//! shared by the reply engine, the conversation coordinator and the webhook
//! server.

pub mod error;
pub mod id;
pub mod locks;

pub use error::{PersistenceError, Result};
pub use id::{OverflowEntryId, ParseIdError, ReplyToken, TurnId, UserId};
pub use locks::{UserGuard, UserLocks};
