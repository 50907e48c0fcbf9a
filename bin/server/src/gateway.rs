//! Outbound delivery through the LINE Messaging API.

use crate::config::LineConfig;
use crate::error::GatewayError;
use async_trait::async_trait;
use larn_relay_core::{ReplyToken, UserId};
use larn_relay_reply::{MessageUnit, PresentedUnit, QuickReply};
use rootcause::Report;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use tracing::{debug, instrument};

/// The platform accepts at most this many quick-reply items per message.
pub const MAX_QUICK_REPLY_ITEMS: usize = 13;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One message in a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text {
        text: String,
        quick_reply: QuickReply,
    },
    Image {
        url: String,
        quick_reply: QuickReply,
    },
    Video {
        url: String,
        preview_url: String,
        quick_reply: QuickReply,
    },
}

impl OutboundMessage {
    #[must_use]
    pub fn text(text: impl Into<String>, quick_reply: QuickReply) -> Self {
        Self::Text {
            text: text.into(),
            quick_reply,
        }
    }

    /// Returns the chips attached to this message.
    #[must_use]
    pub fn quick_reply(&self) -> &QuickReply {
        match self {
            Self::Text { quick_reply, .. }
            | Self::Image { quick_reply, .. }
            | Self::Video { quick_reply, .. } => quick_reply,
        }
    }

    /// Renders the Messaging API message object.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let mut message = match self {
            Self::Text { text, .. } => json!({"type": "text", "text": text}),
            Self::Image { url, .. } => json!({
                "type": "image",
                "originalContentUrl": url,
                "previewImageUrl": url,
            }),
            Self::Video {
                url, preview_url, ..
            } => json!({
                "type": "video",
                "originalContentUrl": url,
                "previewImageUrl": preview_url,
            }),
        };

        let quick_reply = self.quick_reply();
        if !quick_reply.is_empty() {
            let items: Vec<JsonValue> = quick_reply
                .chips()
                .iter()
                .take(MAX_QUICK_REPLY_ITEMS)
                .map(|chip| {
                    json!({
                        "type": "action",
                        "action": {"type": "message", "label": chip.label, "text": chip.value},
                    })
                })
                .collect();
            message["quickReply"] = json!({ "items": items });
        }
        message
    }
}

impl From<PresentedUnit> for OutboundMessage {
    fn from(presented: PresentedUnit) -> Self {
        match presented.unit {
            MessageUnit::Text(text) => Self::Text {
                text,
                quick_reply: presented.quick_reply,
            },
            MessageUnit::Image(url) => Self::Image {
                url,
                quick_reply: presented.quick_reply,
            },
        }
    }
}

/// Trait for the messaging platform.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Sends `messages` against a reply token. One attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    async fn reply(
        &self,
        reply_token: &ReplyToken,
        messages: Vec<OutboundMessage>,
    ) -> Result<(), Report<GatewayError>>;

    /// Shows the typing indicator in the user's chat.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or is rejected.
    async fn show_loading(
        &self,
        user_id: &UserId,
        seconds: u32,
    ) -> Result<(), Report<GatewayError>>;
}

/// Messaging API client.
#[derive(Debug, Clone)]
pub struct LineGateway {
    client: reqwest::Client,
    base_url: String,
    channel_token: String,
}

impl LineGateway {
    /// Builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the client cannot be built.
    pub fn new(config: &LineConfig) -> Result<Self, Report<GatewayError>> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            channel_token: config.channel_token.clone(),
        })
    }

    async fn post(&self, path: &str, body: &JsonValue) -> Result<(), Report<GatewayError>> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.channel_token)
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingGateway for LineGateway {
    #[instrument(skip_all, fields(count = messages.len()))]
    async fn reply(
        &self,
        reply_token: &ReplyToken,
        messages: Vec<OutboundMessage>,
    ) -> Result<(), Report<GatewayError>> {
        let body = json!({
            "replyToken": reply_token.as_str(),
            "messages": messages.iter().map(OutboundMessage::to_json).collect::<Vec<_>>(),
        });
        self.post("/v2/bot/message/reply", &body).await?;
        debug!("reply sent");
        Ok(())
    }

    async fn show_loading(
        &self,
        user_id: &UserId,
        seconds: u32,
    ) -> Result<(), Report<GatewayError>> {
        // Accepted values are multiples of 5 from 5 to 60.
        let seconds = seconds.clamp(5, 60) / 5 * 5;
        let body = json!({"chatId": user_id.as_str(), "loadingSeconds": seconds});
        self.post("/v2/bot/chat/loading/start", &body).await
    }
}
