//! Completion backend for the larn-relay chat relay.
//!
//! This crate provides:
//!
//! - **Backend trait**: `complete` for a reply plus its topic tag, `suggest`
//!   for follow-up prompt candidates
//! - **HTTP backend**: the JSON-over-HTTP client used in production

pub mod backend;
pub mod error;
pub mod http;

pub use backend::{Completion, CompletionBackend};
pub use error::CompletionError;
pub use http::{HttpCompletionBackend, HttpCompletionConfig};
