//! HTTP routes.
//!
//! `POST /` receives webhook callbacks. The body is verified and parsed
//! before anything is acknowledged; events are then handled on background
//! tasks so the platform gets its 200 without waiting on the backend. One
//! task per user runs that user's events in delivery order; different users
//! proceed in parallel. Ordering across separate callbacks is not enforced.

use crate::error::WebhookError;
use crate::event::{WebhookEvent, parse_callback};
use crate::relay::RelayService;
use crate::signature::{SIGNATURE_HEADER, SignatureVerifier};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    relay: RelayService,
    verifier: Arc<SignatureVerifier>,
}

impl AppState {
    pub fn new(relay: RelayService, verifier: SignatureVerifier) -> Self {
        Self {
            relay,
            verifier: Arc::new(verifier),
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(callback))
        .route("/home", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;
    state.verifier.verify(&body, signature)?;

    let events = parse_callback(&body)?;
    debug!(count = events.len(), "Handling events");

    for batch in group_by_user(events) {
        let relay = state.relay.clone();
        tokio::spawn(async move {
            for event in batch {
                relay.handle_event(event).await;
            }
        });
    }
    Ok(StatusCode::OK)
}

/// Groups events per user, keeping delivery order within each group.
/// Events without a user each form their own group.
fn group_by_user(events: Vec<WebhookEvent>) -> Vec<Vec<WebhookEvent>> {
    let mut groups: Vec<Vec<WebhookEvent>> = Vec::new();
    for event in events {
        let existing = event.user_id().and_then(|user_id| {
            groups
                .iter()
                .position(|group| group[0].user_id() == Some(user_id))
        });
        match existing {
            Some(index) => groups[index].push(event),
            None => groups.push(vec![event]),
        }
    }
    groups
}

async fn health() -> Json<JsonValue> {
    Json(json!({"status": "ok"}))
}
