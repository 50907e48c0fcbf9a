//! Reply presentation for the larn-relay chat relay.
//!
//! This crate turns a raw completion into what the user actually sees:
//!
//! - **Segments**: splitting raw text into ordered text and image units
//! - **Quick replies**: clamping suggestion candidates into chips
//! - **Pagination**: shipping the first page now and queueing the rest
//!   for "continue reading" requests

pub mod error;
pub mod paginate;
pub mod quick_reply;
pub mod segment;
pub mod unit;

pub use error::OverflowError;
pub use paginate::{
    DEFAULT_PAGE_SIZE, Drained, OverflowEntry, OverflowPaginator, OverflowStore, Page, paginate,
};
pub use quick_reply::build as build_quick_reply;
pub use segment::parse as parse_segments;
pub use unit::{Chip, MessageUnit, PresentedUnit, QuickReply};
