//! Per-user serialization.
//!
//! Read-modify-write sequences on one user's records (a classification
//! change and its history reset, draining a page of overflow) must not
//! interleave with another task for the same user. `UserLocks` hands out one
//! async mutex per user id. The map only holds weak references; entries whose
//! mutex nobody holds or awaits are pruned on the next acquisition, so its
//! size tracks users with in-flight work rather than every user ever seen.
//!
//! The guarantee is process-local: two server instances do not share locks.

use crate::id::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Guard held while a user's state is being read or modified.
pub type UserGuard = OwnedMutexGuard<()>;

/// Keyed async mutexes, one per active user.
#[derive(Debug, Clone, Default)]
pub struct UserLocks {
    slots: Arc<Mutex<HashMap<UserId, Weak<AsyncMutex<()>>>>>,
}

impl UserLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `user_id`.
    pub async fn lock(&self, user_id: &UserId) -> UserGuard {
        self.slot(user_id).lock_owned().await
    }

    /// Number of users with a live slot.
    #[must_use]
    pub fn active(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.strong_count() > 0).count()
    }

    fn slot(&self, user_id: &UserId) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.retain(|_, slot| slot.strong_count() > 0);

        if let Some(slot) = slots.get(user_id).and_then(Weak::upgrade) {
            return slot;
        }

        let slot = Arc::new(AsyncMutex::new(()));
        slots.insert(user_id.clone(), Arc::downgrade(&slot));
        slot
    }
}
