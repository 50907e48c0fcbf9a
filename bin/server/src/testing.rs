//! Test doubles for the relay's HTTP collaborators.

use crate::config::CommandConfig;
use crate::error::GatewayError;
use crate::gateway::{MessagingGateway, OutboundMessage};
use crate::relay::{RelayService, RelaySettings, Stores};
use async_trait::async_trait;
use larn_relay_ai::{Completion, CompletionBackend, CompletionError};
use larn_relay_conversation::{Classification, Turn};
use larn_relay_core::{ReplyToken, UserId};
use larn_relay_reply::DEFAULT_PAGE_SIZE;
use larn_relay_store::MemoryStore;
use rootcause::Report;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct FakeBackend {
    completion: Option<Completion>,
    suggestions: Option<Vec<String>>,
    completions: AtomicUsize,
}

impl FakeBackend {
    pub fn answering(response: &str, classification: &str) -> Self {
        Self {
            completion: Some(Completion {
                response: response.to_string(),
                classification: Classification::new(classification),
            }),
            suggestions: Some(vec!["วิธีตั้งนาฬิกาปลุก".to_string()]),
            completions: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            completion: None,
            suggestions: None,
            completions: AtomicUsize::new(0),
        }
    }

    pub fn without_suggestions(mut self) -> Self {
        self.suggestions = None;
        self
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for FakeBackend {
    async fn complete(
        &self,
        _message: &str,
        _history: &[Turn],
    ) -> Result<Completion, Report<CompletionError>> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.completion.clone().ok_or_else(|| {
            CompletionError::Unreachable {
                reason: "connection refused".to_string(),
            }
            .into()
        })
    }

    async fn suggest(&self, _message: &str) -> Result<Vec<String>, Report<CompletionError>> {
        self.suggestions.clone().ok_or_else(|| CompletionError::Timeout.into())
    }
}

#[derive(Default)]
pub struct RecordingGateway {
    replies: Mutex<Vec<(ReplyToken, Vec<OutboundMessage>)>>,
    loading: AtomicUsize,
    fail: bool,
}

impl RecordingGateway {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn replies(&self) -> Vec<(ReplyToken, Vec<OutboundMessage>)> {
        self.replies.lock().unwrap().clone()
    }

    pub fn loading_calls(&self) -> usize {
        self.loading.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn reply(
        &self,
        reply_token: &ReplyToken,
        messages: Vec<OutboundMessage>,
    ) -> Result<(), Report<GatewayError>> {
        if self.fail {
            return Err(GatewayError::Rejected {
                status: 400,
                body: "Invalid reply token".to_string(),
            }
            .into());
        }
        self.replies
            .lock()
            .unwrap()
            .push((reply_token.clone(), messages));
        Ok(())
    }

    async fn show_loading(
        &self,
        _user_id: &UserId,
        _seconds: u32,
    ) -> Result<(), Report<GatewayError>> {
        self.loading.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn relay_with(
    store: Arc<MemoryStore>,
    backend: Arc<FakeBackend>,
    gateway: Arc<RecordingGateway>,
) -> RelayService {
    RelayService::new(
        Stores::shared(store),
        backend,
        gateway,
        RelaySettings {
            commands: CommandConfig::default(),
            page_size: DEFAULT_PAGE_SIZE,
            loading_seconds: 60,
        },
    )
}
