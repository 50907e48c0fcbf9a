//! JSON-over-HTTP completion backend.
//!
//! `complete` posts `{"message", "history"}` to the base URL and expects
//! `{"response", "classification"}`. `suggest` posts `{"message"}` to the
//! recommend path and expects `{"response": [..]}`. Each call is a single
//! attempt bounded by the client timeout.

use crate::backend::{Completion, CompletionBackend};
use crate::error::CompletionError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use larn_relay_conversation::Turn;
use rootcause::Report;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Connection settings for [`HttpCompletionBackend`].
#[derive(Debug, Clone)]
pub struct HttpCompletionConfig {
    /// Endpoint for `complete`; the recommend path is appended to it.
    pub base_url: String,
    /// Path of the suggestion endpoint, e.g. `/ai/recommend`.
    pub recommend_path: String,
    /// Upper bound on one request, connect to last byte.
    pub timeout: Duration,
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    message: &'a str,
    history: Vec<HistoryEntry<'a>>,
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    from: &'static str,
    message: &'a str,
    timestamp: DateTime<Utc>,
}

impl<'a> From<&'a Turn> for HistoryEntry<'a> {
    fn from(turn: &'a Turn) -> Self {
        Self {
            from: turn.speaker.as_str(),
            message: &turn.text,
            timestamp: turn.recorded_at,
        }
    }
}

#[derive(Serialize)]
struct SuggestRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct SuggestResponse {
    response: Vec<String>,
}

/// Production completion backend.
#[derive(Debug, Clone)]
pub struct HttpCompletionBackend {
    client: reqwest::Client,
    complete_url: String,
    recommend_url: String,
}

impl HttpCompletionBackend {
    /// Builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the base URL is empty or the client cannot
    /// be built.
    pub fn new(config: &HttpCompletionConfig) -> Result<Self, Report<CompletionError>> {
        if config.base_url.trim().is_empty() {
            return Err(CompletionError::InvalidConfig {
                reason: "base URL is empty".to_string(),
            }
            .into());
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::InvalidConfig {
                reason: e.to_string(),
            })?;

        let base = config.base_url.trim_end_matches('/');
        Ok(Self {
            client,
            complete_url: config.base_url.clone(),
            recommend_url: format!("{base}{}", config.recommend_path),
        })
    }

    async fn post<B, R>(&self, url: &str, body: &B) -> Result<R, Report<CompletionError>>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::UpstreamStatus {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        let parsed =
            serde_json::from_slice(&bytes).map_err(|e| CompletionError::ResponseParseFailed {
                reason: e.to_string(),
            })?;
        Ok(parsed)
    }
}

fn transport_error(e: reqwest::Error) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Unreachable {
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    #[instrument(skip_all, fields(history_len = history.len()))]
    async fn complete(
        &self,
        message: &str,
        history: &[Turn],
    ) -> Result<Completion, Report<CompletionError>> {
        let request = CompleteRequest {
            message,
            history: history.iter().map(HistoryEntry::from).collect(),
        };
        let completion: Completion = self.post(&self.complete_url, &request).await?;
        debug!(classification = %completion.classification, "completion received");
        Ok(completion)
    }

    #[instrument(skip_all)]
    async fn suggest(&self, message: &str) -> Result<Vec<String>, Report<CompletionError>> {
        let response: SuggestResponse = self
            .post(&self.recommend_url, &SuggestRequest { message })
            .await?;
        let suggestions: Vec<String> = response
            .response
            .into_iter()
            .filter(|candidate| !candidate.trim().is_empty())
            .collect();
        debug!(count = suggestions.len(), "suggestions received");
        Ok(suggestions)
    }
}
