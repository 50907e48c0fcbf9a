//! Presentation units and suggestion chips.

use serde::{Deserialize, Serialize};

/// One presentable piece of a reply.
///
/// Units are immutable once parsed; their order is the order the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MessageUnit {
    /// Plain text.
    Text(String),
    /// An image, by URL.
    Image(String),
}

impl MessageUnit {
    /// Creates a text unit.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates an image unit.
    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        Self::Image(url.into())
    }

    /// Returns the text content, if this is a text unit.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image(_) => None,
        }
    }
}

/// A short suggested reply shown alongside a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chip {
    /// Text shown on the chip.
    pub label: String,
    /// Text sent back when the chip is tapped.
    pub value: String,
}

impl Chip {
    /// Creates a chip whose label and value are the same text.
    ///
    /// No clamping happens here; use [`crate::quick_reply::build`] for
    /// untrusted candidates.
    #[must_use]
    pub fn literal(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            label: text.clone(),
            value: text,
        }
    }
}

/// An ordered set of chips attached to one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuickReply(Vec<Chip>);

impl QuickReply {
    /// Creates a quick reply from chips.
    #[must_use]
    pub fn new(chips: Vec<Chip>) -> Self {
        Self(chips)
    }

    /// The single-chip "continue reading" affordance.
    #[must_use]
    pub fn continue_reading(command: impl Into<String>) -> Self {
        Self(vec![Chip::literal(command)])
    }

    /// Returns the chips in display order.
    #[must_use]
    pub fn chips(&self) -> &[Chip] {
        &self.0
    }

    /// Returns true if there are no chips.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of chips.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// A unit paired with the chips delivered alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentedUnit {
    /// The content.
    pub unit: MessageUnit,
    /// Chips for this unit; may be empty.
    pub quick_reply: QuickReply,
}

impl PresentedUnit {
    /// Pairs a unit with its chips.
    #[must_use]
    pub fn new(unit: MessageUnit, quick_reply: QuickReply) -> Self {
        Self { unit, quick_reply }
    }
}
