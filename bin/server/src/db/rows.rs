//! Row types and their conversion into domain values.

use chrono::{DateTime, Utc};
use larn_relay_conversation::{Speaker, Turn};
use larn_relay_core::{OverflowEntryId, PersistenceError, TurnId};
use larn_relay_reply::{MessageUnit, OverflowEntry};
use sqlx::FromRow;
use std::str::FromStr;

const KIND_TEXT: &str = "text";
const KIND_IMAGE: &str = "image";

/// Row type for history queries.
#[derive(FromRow)]
pub(super) struct TurnRow {
    pub seq: i64,
    pub id: String,
    pub speaker: String,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
}

impl TurnRow {
    pub fn try_into_turn(self) -> Result<Turn, PersistenceError> {
        let id = TurnId::from_str(&self.id).map_err(|e| PersistenceError::Corrupt {
            reason: format!("invalid turn id '{}': {e}", self.id),
        })?;
        let speaker = Speaker::parse(&self.speaker).ok_or_else(|| PersistenceError::Corrupt {
            reason: format!("unknown speaker '{}'", self.speaker),
        })?;
        Ok(Turn {
            id,
            speaker,
            text: self.text,
            sequence: self.seq,
            recorded_at: self.recorded_at,
        })
    }
}

/// Row type for overflow queries.
#[derive(FromRow)]
pub(super) struct OverflowRow {
    pub seq: i64,
    pub id: String,
    pub kind: String,
    pub value: String,
}

impl OverflowRow {
    pub fn try_into_entry(self) -> Result<OverflowEntry, PersistenceError> {
        let id = OverflowEntryId::from_str(&self.id).map_err(|e| PersistenceError::Corrupt {
            reason: format!("invalid overflow id '{}': {e}", self.id),
        })?;
        let unit = match self.kind.as_str() {
            KIND_TEXT => MessageUnit::Text(self.value),
            KIND_IMAGE => MessageUnit::Image(self.value),
            other => {
                return Err(PersistenceError::Corrupt {
                    reason: format!("unknown unit kind '{other}'"),
                });
            }
        };
        Ok(OverflowEntry {
            id,
            position: self.seq,
            unit,
        })
    }
}

/// Splits a unit into its stored `(kind, value)` columns.
pub(super) fn unit_columns(unit: &MessageUnit) -> (&'static str, &str) {
    match unit {
        MessageUnit::Text(text) => (KIND_TEXT, text),
        MessageUnit::Image(url) => (KIND_IMAGE, url),
    }
}
