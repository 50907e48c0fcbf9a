//! Segment parsing.
//!
//! The completion backend marks sub-turn boundaries with a fixed delimiter and
//! embeds at most one image per chunk as `[url]`. A chunk whose `[` has no
//! closing `]` is delivered as plain text; later chunks are unaffected.

use crate::unit::MessageUnit;
use tracing::debug;

/// Separates logical sub-turns inside one completion.
pub const SEGMENT_DELIMITER: &str = "% % % % %";

/// Bracket content meaning "this chunk has no image".
pub const NO_IMAGE_SENTINEL: &str = "no_image";

/// Accepted image URL schemes.
pub const IMAGE_SCHEMES: [&str; 2] = ["https://", "http://"];

/// Parses raw completion text into ordered presentation units.
#[must_use]
pub fn parse(raw: &str) -> Vec<MessageUnit> {
    let mut units = Vec::new();
    for (index, chunk) in raw.split(SEGMENT_DELIMITER).enumerate() {
        parse_chunk(index, chunk, &mut units);
    }
    units
}

fn parse_chunk(index: usize, chunk: &str, units: &mut Vec<MessageUnit>) {
    // '[' and ']' are ASCII, so byte offsets from `find` sit on char boundaries.
    let Some(open) = chunk.find('[') else {
        push_text(chunk, units);
        return;
    };

    let marker = &chunk[open + 1..];
    let Some(close) = marker.find(']') else {
        debug!(chunk = index, "unterminated image marker, keeping chunk as text");
        push_text(chunk, units);
        return;
    };

    push_text(&chunk[..open], units);

    let candidate = marker[..close].trim();
    if is_image_url(candidate) {
        units.push(MessageUnit::image(candidate));
    } else if candidate != NO_IMAGE_SENTINEL {
        debug!(chunk = index, "dropping image marker without an accepted scheme");
    }
}

fn push_text(text: &str, units: &mut Vec<MessageUnit>) {
    let text = text.trim();
    if !text.is_empty() {
        units.push(MessageUnit::text(text));
    }
}

fn is_image_url(candidate: &str) -> bool {
    candidate != NO_IMAGE_SENTINEL
        && IMAGE_SCHEMES
            .iter()
            .any(|scheme| candidate.len() > scheme.len() && candidate.starts_with(scheme))
}
