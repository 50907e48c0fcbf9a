//! Conversation turns.

use chrono::{DateTime, Utc};
use larn_relay_core::TurnId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The end user.
    User,
    /// The completion backend.
    Model,
}

impl Speaker {
    /// Returns the stored/wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }

    /// Parses the stored/wire name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "model" => Some(Self::Model),
            _ => None,
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded entry in a user's conversational history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier.
    pub id: TurnId,
    /// Who said it.
    pub speaker: Speaker,
    /// What was said.
    pub text: String,
    /// Store-assigned, strictly increasing per store; defines read order.
    pub sequence: i64,
    /// When the turn was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl Turn {
    /// Creates a turn with the given sequence, stamped now.
    #[must_use]
    pub fn new(speaker: Speaker, text: impl Into<String>, sequence: i64) -> Self {
        Self {
            id: TurnId::new(),
            speaker,
            text: text.into(),
            sequence,
            recorded_at: Utc::now(),
        }
    }
}
