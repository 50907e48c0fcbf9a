//! Quick-reply chip construction.
//!
//! Labels and values are clamped by code point, never by byte, so Thai
//! combining marks and emoji survive intact.

use crate::unit::{Chip, QuickReply};

/// Maximum label length before the ellipsis is appended.
pub const LABEL_MAX_CHARS: usize = 17;

/// Maximum length of the text sent back when a chip is tapped.
pub const VALUE_MAX_CHARS: usize = 300;

/// Appended to labels that were shortened.
pub const ELLIPSIS: char = '…';

const QUOTES: [char; 6] = ['"', '\'', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Builds one chip per usable candidate, preserving order.
///
/// Candidates that are empty once quotes and surrounding whitespace are
/// removed produce no chip.
#[must_use]
pub fn build<I, S>(candidates: I) -> QuickReply
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let chips = candidates
        .into_iter()
        .filter_map(|candidate| chip(candidate.as_ref()))
        .collect();
    QuickReply::new(chips)
}

fn chip(candidate: &str) -> Option<Chip> {
    let stripped: String = candidate.chars().filter(|c| !QUOTES.contains(c)).collect();
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return None;
    }

    let (value, _) = clamp(stripped, VALUE_MAX_CHARS);
    let label = match clamp(stripped, LABEL_MAX_CHARS) {
        (short, true) => format!("{short}{ELLIPSIS}"),
        (whole, false) => whole.to_string(),
    };

    Some(Chip {
        label,
        value: value.to_string(),
    })
}

/// Returns the first `max` code points and whether anything was cut.
fn clamp(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((cut, _)) => (&text[..cut], true),
        None => (text, false),
    }
}
