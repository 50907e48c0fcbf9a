//! LINE webhook server for the larn-relay chat relay.
//!
//! This crate receives signed webhook callbacks, relays user messages to the
//! completion backend and delivers paginated replies with suggestion chips.

pub mod config;
pub mod db;
pub mod error;
pub mod event;
pub mod gateway;
pub mod messages;
pub mod relay;
pub mod routes;
pub mod signature;

#[cfg(test)]
mod testing;
