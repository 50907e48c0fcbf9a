//! Per-event handling.
//!
//! `RelayService` turns one webhook event into one reply. Free text goes to
//! the completion backend; the reply is parsed, paged and delivered, and the
//! interaction is committed to history on a background task. Failures of
//! collaborators never escape: upstream failures become the apology text and
//! persistence failures are logged without touching the reply.

use crate::config::{CommandConfig, ServerConfig};
use crate::event::WebhookEvent;
use crate::gateway::{MessagingGateway, OutboundMessage};
use crate::messages;
use larn_relay_ai::CompletionBackend;
use larn_relay_conversation::{
    CommitHandle, ConversationCoordinator, HistoryStore, Interaction, StateStore,
};
use larn_relay_core::{ReplyToken, UserId};
use larn_relay_reply::{
    Drained, OverflowPaginator, OverflowStore, QuickReply, build_quick_reply, parse_segments,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// The persistence traits the relay depends on.
#[derive(Clone)]
pub struct Stores {
    pub states: Arc<dyn StateStore>,
    pub history: Arc<dyn HistoryStore>,
    pub overflow: Arc<dyn OverflowStore>,
}

impl Stores {
    /// Uses one store for everything.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: StateStore + HistoryStore + OverflowStore + 'static,
    {
        Self {
            states: store.clone(),
            history: store.clone(),
            overflow: store,
        }
    }
}

/// Relay tuning taken from configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub commands: CommandConfig,
    pub page_size: usize,
    pub loading_seconds: u32,
}

impl From<&ServerConfig> for RelaySettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            commands: config.commands.clone(),
            page_size: config.reply.page_size,
            loading_seconds: config.line.loading_seconds,
        }
    }
}

/// What handling an event did.
#[derive(Debug)]
pub enum Handled {
    /// A completion was delivered; the commit runs in the background.
    Answered {
        delivered: usize,
        queued: usize,
        commit: CommitHandle,
    },
    /// A page of pending overflow was delivered.
    Continued { delivered: usize, has_more: bool },
    /// Nothing was pending.
    NothingMore,
    /// The tutorial was sent.
    Tutorial,
    /// The completion path failed; the apology was sent.
    Apologized,
    /// A new follower was greeted.
    Welcomed { created: bool },
    /// A user's data was removed.
    Forgotten,
    /// The event was not one the relay handles.
    Skipped,
}

/// Handles webhook events.
#[derive(Clone)]
pub struct RelayService {
    backend: Arc<dyn CompletionBackend>,
    gateway: Arc<dyn MessagingGateway>,
    coordinator: ConversationCoordinator,
    paginator: OverflowPaginator,
    settings: RelaySettings,
    default_reply: QuickReply,
}

impl RelayService {
    pub fn new(
        stores: Stores,
        backend: Arc<dyn CompletionBackend>,
        gateway: Arc<dyn MessagingGateway>,
        settings: RelaySettings,
    ) -> Self {
        let paginator = OverflowPaginator::new(
            stores.overflow,
            settings.page_size,
            settings.commands.read_more.clone(),
        );
        Self {
            backend,
            gateway,
            coordinator: ConversationCoordinator::new(stores.states, stores.history),
            paginator,
            settings,
            default_reply: messages::default_quick_reply(),
        }
    }

    /// Handles one event to completion, except for the history commit.
    pub async fn handle_event(&self, event: WebhookEvent) -> Handled {
        match event {
            WebhookEvent::Message {
                user_id,
                reply_token,
                text,
            } => self.handle_message(&user_id, &reply_token, text).await,
            WebhookEvent::Follow {
                user_id,
                reply_token,
            } => self.handle_follow(&user_id, &reply_token).await,
            WebhookEvent::Unfollow { user_id } => self.handle_unfollow(&user_id).await,
            WebhookEvent::Unsupported { description } => {
                info!(%description, "Skipping unsupported event");
                Handled::Skipped
            }
        }
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    async fn handle_message(
        &self,
        user_id: &UserId,
        reply_token: &ReplyToken,
        text: String,
    ) -> Handled {
        self.show_loading(user_id).await;

        let commands = &self.settings.commands;
        if text == commands.tutorial {
            self.send_tutorial(reply_token).await
        } else if text == commands.read_more {
            self.continue_reading(user_id, reply_token).await
        } else {
            self.answer(user_id, reply_token, text).await
        }
    }

    async fn answer(&self, user_id: &UserId, reply_token: &ReplyToken, text: String) -> Handled {
        let history = match self.coordinator.history(user_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "Failed to load history, answering without it");
                Vec::new()
            }
        };

        let completion = match self.backend.complete(&text, &history).await {
            Ok(completion) => completion,
            Err(e) => {
                error!(error = %e, "Completion failed");
                return self.apologize(reply_token).await;
            }
        };

        let units = parse_segments(&completion.response);
        if units.is_empty() {
            warn!("Completion produced no deliverable content");
            return self.apologize(reply_token).await;
        }

        let suggestions = self.suggestions(&completion.response).await;

        let commit = self.coordinator.spawn_commit(Interaction {
            user_id: user_id.clone(),
            user_text: text,
            model_text: completion.response,
            classification: completion.classification,
        });

        let page = self.paginator.paginate(units, &suggestions);
        let queued = page.remainder.len();
        if let Err(e) = self.paginator.store_remainder(user_id, &page.remainder).await {
            error!(error = %e, "Failed to queue overflow");
        }

        let delivered = page.delivered.len();
        let outbound = page.delivered.into_iter().map(OutboundMessage::from).collect();
        self.send(reply_token, outbound).await;

        Handled::Answered {
            delivered,
            queued,
            commit,
        }
    }

    async fn suggestions(&self, response: &str) -> QuickReply {
        match self.backend.suggest(response).await {
            Ok(candidates) => {
                let built = build_quick_reply(candidates);
                if built.is_empty() {
                    self.default_reply.clone()
                } else {
                    built
                }
            }
            Err(e) => {
                warn!(error = %e, "Suggestions failed, using defaults");
                self.default_reply.clone()
            }
        }
    }

    async fn continue_reading(&self, user_id: &UserId, reply_token: &ReplyToken) -> Handled {
        match self.paginator.drain_next(user_id).await {
            Ok(Drained::Page { units, has_more }) => {
                let delivered = units.len();
                let outbound = self
                    .paginator
                    .present(units, has_more, &self.default_reply)
                    .into_iter()
                    .map(OutboundMessage::from)
                    .collect();
                self.send(reply_token, outbound).await;
                Handled::Continued {
                    delivered,
                    has_more,
                }
            }
            Ok(Drained::NothingMore) => {
                let message =
                    OutboundMessage::text(messages::NOTHING_MORE, self.default_reply.clone());
                self.send(reply_token, vec![message]).await;
                Handled::NothingMore
            }
            Err(e) => {
                error!(error = %e, "Failed to read pending overflow");
                self.apologize(reply_token).await
            }
        }
    }

    async fn send_tutorial(&self, reply_token: &ReplyToken) -> Handled {
        let outbound = vec![
            OutboundMessage::text(messages::TUTORIAL, self.default_reply.clone()),
            OutboundMessage::Video {
                url: messages::TUTORIAL_VIDEO_URL.to_string(),
                preview_url: messages::TUTORIAL_PREVIEW_URL.to_string(),
                quick_reply: self.default_reply.clone(),
            },
        ];
        self.send(reply_token, outbound).await;
        Handled::Tutorial
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    async fn handle_follow(&self, user_id: &UserId, reply_token: &ReplyToken) -> Handled {
        self.show_loading(user_id).await;

        let created = match self.coordinator.register(user_id).await {
            Ok(created) => created,
            Err(e) => {
                error!(error = %e, "Failed to create user document");
                false
            }
        };

        let outbound = std::iter::once(messages::WELCOME)
            .chain(messages::EXAMPLES)
            .map(|text| OutboundMessage::text(text, self.default_reply.clone()))
            .collect();
        self.send(reply_token, outbound).await;

        info!(created, "Greeted follower");
        Handled::Welcomed { created }
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    async fn handle_unfollow(&self, user_id: &UserId) -> Handled {
        match self.coordinator.forget(user_id).await {
            Ok(turns) => debug!(turns, "removed user document and history"),
            Err(e) => error!(error = %e, "Failed to remove user document and history"),
        }
        match self.paginator.discard(user_id).await {
            Ok(units) => debug!(units, "removed pending overflow"),
            Err(e) => error!(error = %e, "Failed to remove pending overflow"),
        }
        info!("Forgot unfollowed user");
        Handled::Forgotten
    }

    async fn apologize(&self, reply_token: &ReplyToken) -> Handled {
        let message = OutboundMessage::text(messages::APOLOGY, self.default_reply.clone());
        self.send(reply_token, vec![message]).await;
        Handled::Apologized
    }

    async fn show_loading(&self, user_id: &UserId) {
        if let Err(e) = self
            .gateway
            .show_loading(user_id, self.settings.loading_seconds)
            .await
        {
            warn!(error = %e, "Failed to show loading indicator");
        }
    }

    async fn send(&self, reply_token: &ReplyToken, messages: Vec<OutboundMessage>) {
        if let Err(e) = self.gateway.reply(reply_token, messages).await {
            error!(error = %e, "Failed to deliver reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, RecordingGateway, relay_with};
    use larn_relay_conversation::{Classification, Speaker, TopicChange};
    use larn_relay_reply::MessageUnit;
    use larn_relay_store::MemoryStore;

    fn message(user: &str, text: &str) -> WebhookEvent {
        WebhookEvent::Message {
            user_id: UserId::new(user),
            reply_token: ReplyToken::new(format!("token-{text}")),
            text: text.to_string(),
        }
    }

    fn seven_units() -> String {
        (1..=7)
            .map(|i| format!("ข้อ {i}"))
            .collect::<Vec<_>>()
            .join("% % % % %")
    }

    #[tokio::test]
    async fn long_answer_is_paged_and_committed() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(FakeBackend::answering(&seven_units(), "phone_help"));
        let gateway = Arc::new(RecordingGateway::default());
        let relay = relay_with(store.clone(), backend, gateway.clone());
        let user = UserId::new("U1");

        let Handled::Answered {
            delivered,
            queued,
            commit,
        } = relay.handle_event(message("U1", "ตั้งนาฬิกาปลุก")).await
        else {
            panic!("expected an answer");
        };
        assert_eq!((delivered, queued), (5, 2));

        let committed = commit.await.expect("join").expect("commit");
        assert_eq!(committed.topic, TopicChange::First);

        let replies = gateway.replies();
        assert_eq!(replies.len(), 1);
        let sent = &replies[0].1;
        assert_eq!(sent.len(), 5);
        assert_eq!(
            sent[4].quick_reply(),
            &QuickReply::continue_reading("อ่านต่อ")
        );
        assert_eq!(sent[0].quick_reply().chips()[0].value, "วิธีตั้งนาฬิกาปลุก");

        let history = store.history(&user).await.expect("history");
        let speakers: Vec<_> = history.iter().map(|t| t.speaker).collect();
        assert_eq!(speakers, vec![Speaker::User, Speaker::Model]);
        assert_eq!(history[0].text, "ตั้งนาฬิกาปลุก");
        assert_eq!(gateway.loading_calls(), 1);
    }

    #[tokio::test]
    async fn read_more_drains_then_reports_nothing_more() {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(FakeBackend::answering(&seven_units(), "phone_help"));
        let gateway = Arc::new(RecordingGateway::default());
        let relay = relay_with(store, backend.clone(), gateway.clone());

        relay.handle_event(message("U1", "ตั้งนาฬิกาปลุก")).await;

        let continued = relay.handle_event(message("U1", "อ่านต่อ")).await;
        assert!(matches!(
            continued,
            Handled::Continued {
                delivered: 2,
                has_more: false
            }
        ));
        let replies = gateway.replies();
        let page = &replies[1].1;
        assert_eq!(
            page[0],
            OutboundMessage::text("ข้อ 6", messages::default_quick_reply())
        );
        assert_eq!(page[1].quick_reply(), &messages::default_quick_reply());

        let finished = relay.handle_event(message("U1", "อ่านต่อ")).await;
        assert!(matches!(finished, Handled::NothingMore));
        assert_eq!(
            gateway.replies()[2].1,
            vec![OutboundMessage::text(
                messages::NOTHING_MORE,
                messages::default_quick_reply()
            )]
        );
        assert_eq!(backend.completions(), 1);
    }

    #[tokio::test]
    async fn backend_failure_sends_apology_and_records_nothing() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::default());
        let relay = relay_with(
            store.clone(),
            Arc::new(FakeBackend::failing()),
            gateway.clone(),
        );

        let handled = relay.handle_event(message("U1", "hello")).await;

        assert!(matches!(handled, Handled::Apologized));
        let replies = gateway.replies();
        assert_eq!(replies[0].0, ReplyToken::new("token-hello"));
        assert_eq!(
            replies[0].1,
            vec![OutboundMessage::text(
                messages::APOLOGY,
                messages::default_quick_reply()
            )]
        );
        assert!(store.history(&UserId::new("U1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_completion_sends_apology() {
        let backend = Arc::new(FakeBackend::answering("  % % % % %[no_image]", "x"));
        let gateway = Arc::new(RecordingGateway::default());
        let relay = relay_with(Arc::new(MemoryStore::new()), backend, gateway.clone());

        let handled = relay.handle_event(message("U1", "hello")).await;
        assert!(matches!(handled, Handled::Apologized));
    }

    #[tokio::test]
    async fn failed_suggestions_fall_back_to_defaults() {
        let backend = Arc::new(
            FakeBackend::answering("คำตอบ[https://img/a.png]", "phone_help").without_suggestions(),
        );
        let gateway = Arc::new(RecordingGateway::default());
        let relay = relay_with(Arc::new(MemoryStore::new()), backend, gateway.clone());

        relay.handle_event(message("U1", "hello")).await;

        let sent = gateway.replies().remove(0).1;
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[1], OutboundMessage::Image { .. }));
        assert!(
            sent.iter()
                .all(|m| m.quick_reply() == &messages::default_quick_reply())
        );
    }

    #[tokio::test]
    async fn topic_switch_keeps_only_latest_exchange() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::default());
        let user = UserId::new("U1");

        let first = relay_with(
            store.clone(),
            Arc::new(FakeBackend::answering("a1", "phone_help")),
            gateway.clone(),
        );
        let Handled::Answered { commit, .. } = first.handle_event(message("U1", "q1")).await else {
            panic!("expected an answer");
        };
        commit.await.expect("join").expect("commit");

        let second = relay_with(
            store.clone(),
            Arc::new(FakeBackend::answering("a2", "news_check")),
            gateway,
        );
        let Handled::Answered { commit, .. } = second.handle_event(message("U1", "q2")).await
        else {
            panic!("expected an answer");
        };
        let committed = commit.await.expect("join").expect("commit");

        assert!(committed.topic.is_reset());
        let texts: Vec<_> = store
            .history(&user)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["q2", "a2"]);
        let state = store.load_state(&user).await.unwrap().unwrap();
        assert_eq!(
            state.current_classification,
            Some(Classification::new("news_check"))
        );
    }

    #[tokio::test]
    async fn tutorial_command_sends_text_and_video() {
        let backend = Arc::new(FakeBackend::answering("unused", "x"));
        let gateway = Arc::new(RecordingGateway::default());
        let relay = relay_with(Arc::new(MemoryStore::new()), backend.clone(), gateway.clone());

        let handled = relay.handle_event(message("U1", "วิธีเช็คข่าวปลอม")).await;

        assert!(matches!(handled, Handled::Tutorial));
        let sent = gateway.replies().remove(0).1;
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            &sent[1],
            OutboundMessage::Video { url, .. } if url == messages::TUTORIAL_VIDEO_URL
        ));
        assert_eq!(backend.completions(), 0);
    }

    #[tokio::test]
    async fn follow_then_unfollow() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::default());
        let relay = relay_with(
            store.clone(),
            Arc::new(FakeBackend::answering(&seven_units(), "phone_help")),
            gateway.clone(),
        );
        let user = UserId::new("U1");

        let handled = relay
            .handle_event(WebhookEvent::Follow {
                user_id: user.clone(),
                reply_token: ReplyToken::new("follow"),
            })
            .await;
        assert!(matches!(handled, Handled::Welcomed { created: true }));
        assert_eq!(gateway.replies()[0].1.len(), 4);
        assert!(store.load_state(&user).await.unwrap().is_some());

        if let Handled::Answered { commit, .. } = relay.handle_event(message("U1", "q")).await {
            commit.await.expect("join").expect("commit");
        }

        let handled = relay
            .handle_event(WebhookEvent::Unfollow {
                user_id: user.clone(),
            })
            .await;
        assert!(matches!(handled, Handled::Forgotten));
        assert!(store.load_state(&user).await.unwrap().is_none());
        assert!(store.history(&user).await.unwrap().is_empty());
        assert!(store.oldest_overflow(&user, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsupported_event_touches_nothing() {
        let gateway = Arc::new(RecordingGateway::default());
        let relay = relay_with(
            Arc::new(MemoryStore::new()),
            Arc::new(FakeBackend::answering("unused", "x")),
            gateway.clone(),
        );

        let handled = relay
            .handle_event(WebhookEvent::Unsupported {
                description: "sticker".to_string(),
            })
            .await;

        assert!(matches!(handled, Handled::Skipped));
        assert!(gateway.replies().is_empty());
        assert_eq!(gateway.loading_calls(), 0);
    }

    #[tokio::test]
    async fn delivery_failure_does_not_block_commit() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::failing());
        let relay = relay_with(
            store.clone(),
            Arc::new(FakeBackend::answering("คำตอบ", "phone_help")),
            gateway,
        );

        let Handled::Answered { commit, .. } = relay.handle_event(message("U1", "q")).await else {
            panic!("expected an answer");
        };
        commit.await.expect("join").expect("commit");
        assert_eq!(store.history(&UserId::new("U1")).await.unwrap().len(), 2);
    }

    #[test]
    fn image_units_become_image_messages() {
        let unit = MessageUnit::image("https://img/a.png");
        let message = OutboundMessage::from(larn_relay_reply::PresentedUnit::new(
            unit,
            QuickReply::default(),
        ));
        assert!(matches!(message, OutboundMessage::Image { .. }));
    }
}
