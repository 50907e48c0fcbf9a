//! In-memory persistence for the larn-relay chat relay.
//!
//! [`MemoryStore`] implements every storage trait the relay consumes. It is
//! used when no database is configured and in tests. Sequence numbers come
//! from one counter shared by history and overflow, so insertion order is
//! read order for both.

use async_trait::async_trait;
use larn_relay_conversation::{
    Classification, ConversationState, HistoryStore, Speaker, StateStore, Turn,
};
use larn_relay_core::{OverflowEntryId, PersistenceError, UserId};
use larn_relay_reply::{MessageUnit, OverflowEntry, OverflowStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct UserRecord {
    document: Option<ConversationState>,
    history: Vec<Turn>,
    overflow: Vec<OverflowEntry>,
}

impl UserRecord {
    fn is_empty(&self) -> bool {
        self.document.is_none() && self.history.is_empty() && self.overflow.is_empty()
    }
}

/// Process-local store for user documents, history and overflow.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, UserRecord>>,
    sequence: AtomicI64,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_sequence(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn read<T>(&self, user_id: &UserId, f: impl FnOnce(&UserRecord) -> T) -> Option<T> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.get(user_id).map(f)
    }

    fn write<T>(&self, user_id: &UserId, f: impl FnOnce(&mut UserRecord) -> T) -> T {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        f(users.entry(user_id.clone()).or_default())
    }

    /// Applies a removal to an existing record, dropping the record once it
    /// holds nothing. Unknown users are left absent.
    fn remove<T: Default>(&self, user_id: &UserId, f: impl FnOnce(&mut UserRecord) -> T) -> T {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        let Some(record) = users.get_mut(user_id) else {
            return T::default();
        };
        let removed = f(record);
        if record.is_empty() {
            users.remove(user_id);
        }
        removed
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_state(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ConversationState>, PersistenceError> {
        Ok(self.read(user_id, |record| record.document.clone()).flatten())
    }

    async fn save_classification(
        &self,
        user_id: &UserId,
        classification: &Classification,
    ) -> Result<(), PersistenceError> {
        self.write(user_id, |record| {
            record.document = Some(ConversationState {
                current_classification: Some(classification.clone()),
            });
        });
        Ok(())
    }

    async fn ensure_user(&self, user_id: &UserId) -> Result<bool, PersistenceError> {
        Ok(self.write(user_id, |record| {
            if record.document.is_some() {
                return false;
            }
            record.document = Some(ConversationState::default());
            true
        }))
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), PersistenceError> {
        self.remove(user_id, |record| record.document = None);
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append_turn(
        &self,
        user_id: &UserId,
        speaker: Speaker,
        text: &str,
    ) -> Result<Turn, PersistenceError> {
        let turn = Turn::new(speaker, text, self.next_sequence());
        self.write(user_id, |record| record.history.push(turn.clone()));
        Ok(turn)
    }

    async fn history(&self, user_id: &UserId) -> Result<Vec<Turn>, PersistenceError> {
        Ok(self
            .read(user_id, |record| record.history.clone())
            .unwrap_or_default())
    }

    async fn clear_history(&self, user_id: &UserId) -> Result<u64, PersistenceError> {
        let removed = self.remove(user_id, |record| std::mem::take(&mut record.history));
        Ok(removed.len() as u64)
    }
}

#[async_trait]
impl OverflowStore for MemoryStore {
    async fn append_overflow(
        &self,
        user_id: &UserId,
        units: &[MessageUnit],
    ) -> Result<(), PersistenceError> {
        let entries: Vec<OverflowEntry> = units
            .iter()
            .map(|unit| OverflowEntry {
                id: OverflowEntryId::new(),
                position: self.next_sequence(),
                unit: unit.clone(),
            })
            .collect();
        self.write(user_id, |record| record.overflow.extend(entries));
        Ok(())
    }

    async fn oldest_overflow(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<OverflowEntry>, PersistenceError> {
        Ok(self
            .read(user_id, |record| record.overflow.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_overflow_entry(
        &self,
        user_id: &UserId,
        id: OverflowEntryId,
    ) -> Result<(), PersistenceError> {
        self.remove(user_id, |record| record.overflow.retain(|entry| entry.id != id));
        Ok(())
    }

    async fn clear_overflow(&self, user_id: &UserId) -> Result<u64, PersistenceError> {
        let removed = self.remove(user_id, |record| std::mem::take(&mut record.overflow));
        Ok(removed.len() as u64)
    }
}
