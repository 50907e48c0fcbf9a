//! Inbound webhook events.
//!
//! The callback body is parsed in two steps: the envelope must be valid JSON
//! with an `events` array, then each event is decoded on its own. Events the
//! relay does not handle, including ones that fail to decode, become
//! [`WebhookEvent::Unsupported`] so one odd event never rejects the batch.

use crate::error::WebhookError;
use larn_relay_core::{ReplyToken, UserId};
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// An event the relay acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// A text message from a user.
    Message {
        user_id: UserId,
        reply_token: ReplyToken,
        text: String,
    },
    /// A user added the account.
    Follow {
        user_id: UserId,
        reply_token: ReplyToken,
    },
    /// A user blocked the account.
    Unfollow { user_id: UserId },
    /// Anything else; logged and skipped.
    Unsupported { description: String },
}

impl WebhookEvent {
    /// The user the event concerns, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Message { user_id, .. }
            | Self::Follow { user_id, .. }
            | Self::Unfollow { user_id } => Some(user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Deserialize)]
struct Callback {
    events: Vec<JsonValue>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawEvent {
    Message {
        #[serde(rename = "replyToken")]
        reply_token: String,
        source: RawSource,
        message: RawContent,
    },
    Follow {
        #[serde(rename = "replyToken")]
        reply_token: String,
        source: RawSource,
    },
    Unfollow {
        source: RawSource,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawSource {
    User {
        #[serde(rename = "userId")]
        user_id: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Parses a callback body into events, in delivery order.
///
/// # Errors
///
/// Returns `MalformedBody` if the envelope itself cannot be decoded.
pub fn parse_callback(body: &[u8]) -> Result<Vec<WebhookEvent>, WebhookError> {
    let callback: Callback =
        serde_json::from_slice(body).map_err(|e| WebhookError::MalformedBody {
            reason: e.to_string(),
        })?;
    Ok(callback.events.into_iter().map(decode).collect())
}

fn decode(value: JsonValue) -> WebhookEvent {
    let kind = value
        .get("type")
        .and_then(JsonValue::as_str)
        .unwrap_or("unknown")
        .to_string();

    let raw: RawEvent = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            return unsupported(format!("undecodable {kind} event: {e}"));
        }
    };

    match raw {
        RawEvent::Message {
            reply_token,
            source: RawSource::User { user_id },
            message: RawContent::Text { text },
        } => WebhookEvent::Message {
            user_id: UserId::new(user_id),
            reply_token: ReplyToken::new(reply_token),
            text,
        },
        RawEvent::Message {
            source: RawSource::User { .. },
            ..
        } => unsupported("non-text message content"),
        RawEvent::Follow {
            reply_token,
            source: RawSource::User { user_id },
        } => WebhookEvent::Follow {
            user_id: UserId::new(user_id),
            reply_token: ReplyToken::new(reply_token),
        },
        RawEvent::Unfollow {
            source: RawSource::User { user_id },
        } => WebhookEvent::Unfollow {
            user_id: UserId::new(user_id),
        },
        RawEvent::Message { .. } | RawEvent::Follow { .. } | RawEvent::Unfollow { .. } => {
            unsupported(format!("{kind} event from a non-user source"))
        }
        RawEvent::Other => unsupported(format!("{kind} event")),
    }
}

fn unsupported(description: impl Into<String>) -> WebhookEvent {
    WebhookEvent::Unsupported {
        description: description.into(),
    }
}
