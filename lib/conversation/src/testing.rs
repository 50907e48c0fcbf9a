//! In-memory stores for unit tests.

use crate::history::HistoryStore;
use crate::state::{Classification, ConversationState, StateStore};
use crate::turn::{Speaker, Turn};
use async_trait::async_trait;
use larn_relay_core::{PersistenceError, UserId};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
pub struct MockStore {
    documents: Mutex<HashMap<UserId, ConversationState>>,
    turns: Mutex<HashMap<UserId, Vec<Turn>>>,
    sequence: AtomicUsize,
    state_writes: AtomicUsize,
    append_attempts: AtomicUsize,
    fail_state_writes: AtomicBool,
    fail_history_appends: AtomicBool,
    fail_history_reads: AtomicBool,
}

impl MockStore {
    pub fn seed_turns(&self, user_id: &UserId, count: usize) {
        let mut turns = self.turns.lock().unwrap();
        let entry = turns.entry(user_id.clone()).or_default();
        for i in 0..count {
            let speaker = if i % 2 == 0 {
                Speaker::User
            } else {
                Speaker::Model
            };
            entry.push(Turn::new(speaker, format!("seed {i}"), self.next_sequence()));
        }
    }

    pub fn turns(&self, user_id: &UserId) -> Vec<Turn> {
        self.turns
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_classification(&self, user_id: &UserId, tag: &str) {
        self.documents.lock().unwrap().insert(
            user_id.clone(),
            ConversationState {
                current_classification: Some(Classification::new(tag)),
            },
        );
    }

    pub fn classification(&self, user_id: &UserId) -> Option<Classification> {
        self.documents
            .lock()
            .unwrap()
            .get(user_id)
            .and_then(|doc| doc.current_classification.clone())
    }

    pub fn has_document(&self, user_id: &UserId) -> bool {
        self.documents.lock().unwrap().contains_key(user_id)
    }

    pub fn state_writes(&self) -> usize {
        self.state_writes.load(Ordering::SeqCst)
    }

    pub fn append_attempts(&self) -> usize {
        self.append_attempts.load(Ordering::SeqCst)
    }

    pub fn fail_state_writes(&self) {
        self.fail_state_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_history_appends(&self) {
        self.fail_history_appends.store(true, Ordering::SeqCst);
    }

    pub fn fail_history_reads(&self) {
        self.fail_history_reads.store(true, Ordering::SeqCst);
    }

    fn next_sequence(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) as i64 + 1
    }

    fn write_failed() -> PersistenceError {
        PersistenceError::WriteFailed {
            reason: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl StateStore for MockStore {
    async fn load_state(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ConversationState>, PersistenceError> {
        Ok(self.documents.lock().unwrap().get(user_id).cloned())
    }

    async fn save_classification(
        &self,
        user_id: &UserId,
        classification: &Classification,
    ) -> Result<(), PersistenceError> {
        if self.fail_state_writes.load(Ordering::SeqCst) {
            return Err(Self::write_failed());
        }
        self.state_writes.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .unwrap()
            .entry(user_id.clone())
            .or_default()
            .current_classification = Some(classification.clone());
        Ok(())
    }

    async fn ensure_user(&self, user_id: &UserId) -> Result<bool, PersistenceError> {
        let mut documents = self.documents.lock().unwrap();
        if documents.contains_key(user_id) {
            return Ok(false);
        }
        documents.insert(user_id.clone(), ConversationState::default());
        Ok(true)
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), PersistenceError> {
        self.documents.lock().unwrap().remove(user_id);
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MockStore {
    async fn append_turn(
        &self,
        user_id: &UserId,
        speaker: Speaker,
        text: &str,
    ) -> Result<Turn, PersistenceError> {
        self.append_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_history_appends.load(Ordering::SeqCst) {
            return Err(Self::write_failed());
        }
        let turn = Turn::new(speaker, text, self.next_sequence());
        self.turns
            .lock()
            .unwrap()
            .entry(user_id.clone())
            .or_default()
            .push(turn.clone());
        Ok(turn)
    }

    async fn history(&self, user_id: &UserId) -> Result<Vec<Turn>, PersistenceError> {
        if self.fail_history_reads.load(Ordering::SeqCst) {
            return Err(PersistenceError::ReadFailed {
                reason: "injected failure".to_string(),
            });
        }
        Ok(self.turns(user_id))
    }

    async fn clear_history(&self, user_id: &UserId) -> Result<u64, PersistenceError> {
        let removed = self.turns.lock().unwrap().remove(user_id);
        Ok(removed.map_or(0, |turns| turns.len() as u64))
    }
}
