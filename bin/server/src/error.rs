//! Domain error types for server operations.
//!
//! `WebhookError` is the only error that reaches the HTTP boundary; the
//! rest are logged by the relay, which falls back to fixed texts.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Errors rejecting an inbound webhook request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// The signature header is absent or not valid UTF-8.
    MissingSignature,
    /// The signature does not match the body.
    InvalidSignature,
    /// The body is not a webhook callback document.
    MalformedBody { reason: String },
}

impl fmt::Display for WebhookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSignature => write!(f, "missing webhook signature"),
            Self::InvalidSignature => write!(f, "invalid webhook signature"),
            Self::MalformedBody { reason } => {
                write!(f, "malformed webhook body: {reason}")
            }
        }
    }
}

impl std::error::Error for WebhookError {}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "Rejected webhook request");
        let message = match self {
            Self::MissingSignature | Self::InvalidSignature => "Invalid signature",
            Self::MalformedBody { .. } => "Malformed request",
        };
        (StatusCode::BAD_REQUEST, message).into_response()
    }
}

/// Errors from the messaging gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request did not complete.
    RequestFailed { reason: String },
    /// The platform answered with a non-success status.
    Rejected { status: u16, body: String },
    /// The client could not be constructed.
    InvalidConfig { reason: String },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestFailed { reason } => {
                write!(f, "messaging request failed: {reason}")
            }
            Self::Rejected { status, body } => {
                write!(f, "messaging platform returned {status}: {body}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid messaging configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for GatewayError {}
