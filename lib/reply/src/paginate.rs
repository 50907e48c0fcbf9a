//! Overflow pagination.
//!
//! A reply ships at most one page of units; the remainder is queued per user
//! and served, oldest first, by later "continue reading" requests. Entries are
//! removed when they are handed out. A failed delete is logged and the entry
//! is not re-queued, so consumption is at-most-once per successful delete.
//! Queue operations for one user hold that user's lock, so overlapping
//! "continue" requests never hand out the same entry twice.

use crate::error::OverflowError;
use crate::unit::{MessageUnit, PresentedUnit, QuickReply};
use async_trait::async_trait;
use larn_relay_core::{OverflowEntryId, PersistenceError, UserId, UserLocks};
use rootcause::Report;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Units per delivered page; the messaging platform caps one reply at five.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// One queued unit with its store-assigned position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowEntry {
    /// Entry identity, used for deletion.
    pub id: OverflowEntryId,
    /// Monotonic insertion position; reads are ordered by it.
    pub position: i64,
    /// The queued unit.
    pub unit: MessageUnit,
}

/// Storage for per-user pending overflow.
///
/// Implementations must assign positions that increase with insertion order,
/// across calls, and return entries in that order.
#[async_trait]
pub trait OverflowStore: Send + Sync {
    /// Appends units, in order, to the user's queue.
    async fn append_overflow(
        &self,
        user_id: &UserId,
        units: &[MessageUnit],
    ) -> Result<(), PersistenceError>;

    /// Returns up to `limit` of the oldest entries, oldest first.
    async fn oldest_overflow(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<OverflowEntry>, PersistenceError>;

    /// Deletes one entry.
    async fn delete_overflow_entry(
        &self,
        user_id: &UserId,
        id: OverflowEntryId,
    ) -> Result<(), PersistenceError>;

    /// Deletes the user's whole queue, returning how many entries went.
    async fn clear_overflow(&self, user_id: &UserId) -> Result<u64, PersistenceError>;
}

/// The split of a reply into what ships now and what waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Units delivered with this reply, chips attached.
    pub delivered: Vec<PresentedUnit>,
    /// Units to queue, in original order.
    pub remainder: Vec<MessageUnit>,
}

impl Page {
    /// Returns true if some units did not fit on this page.
    #[must_use]
    pub fn has_remainder(&self) -> bool {
        !self.remainder.is_empty()
    }
}

/// Result of a "continue reading" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drained {
    /// The next page, oldest first.
    Page {
        units: Vec<MessageUnit>,
        /// Whether entries remain queued after this page.
        has_more: bool,
    },
    /// The queue was empty.
    NothingMore,
}

/// Splits `units` into the first `page_size` and the rest.
///
/// Every delivered unit carries `suggestions`, except that the last one
/// carries `continue_reply` instead when a remainder exists.
#[must_use]
pub fn paginate(
    mut units: Vec<MessageUnit>,
    suggestions: &QuickReply,
    continue_reply: &QuickReply,
    page_size: usize,
) -> Page {
    let page_size = page_size.max(1);
    let remainder = if units.len() > page_size {
        units.split_off(page_size)
    } else {
        Vec::new()
    };
    let delivered = attach_chips(units, !remainder.is_empty(), suggestions, continue_reply);
    Page {
        delivered,
        remainder,
    }
}

fn attach_chips(
    units: Vec<MessageUnit>,
    has_more: bool,
    suggestions: &QuickReply,
    continue_reply: &QuickReply,
) -> Vec<PresentedUnit> {
    let last = units.len().saturating_sub(1);
    units
        .into_iter()
        .enumerate()
        .map(|(i, unit)| {
            let chips = if has_more && i == last {
                continue_reply
            } else {
                suggestions
            };
            PresentedUnit::new(unit, chips.clone())
        })
        .collect()
}

/// Pages replies and serves the per-user overflow queue.
#[derive(Clone)]
pub struct OverflowPaginator {
    store: Arc<dyn OverflowStore>,
    page_size: usize,
    continue_reply: QuickReply,
    locks: UserLocks,
}

impl OverflowPaginator {
    /// Creates a paginator.
    ///
    /// `continue_command` is the literal text the continue chip sends back.
    pub fn new(
        store: Arc<dyn OverflowStore>,
        page_size: usize,
        continue_command: impl Into<String>,
    ) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
            continue_reply: QuickReply::continue_reading(continue_command),
            locks: UserLocks::new(),
        }
    }

    /// Returns the page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Splits a freshly parsed reply.
    #[must_use]
    pub fn paginate(&self, units: Vec<MessageUnit>, suggestions: &QuickReply) -> Page {
        paginate(units, suggestions, &self.continue_reply, self.page_size)
    }

    /// Attaches chips to a drained page.
    #[must_use]
    pub fn present(
        &self,
        units: Vec<MessageUnit>,
        has_more: bool,
        suggestions: &QuickReply,
    ) -> Vec<PresentedUnit> {
        attach_chips(units, has_more, suggestions, &self.continue_reply)
    }

    /// Appends `remainder` to the user's queue.
    #[instrument(skip_all, fields(user_id = %user_id, count = remainder.len()))]
    pub async fn store_remainder(
        &self,
        user_id: &UserId,
        remainder: &[MessageUnit],
    ) -> Result<(), Report<OverflowError>> {
        if remainder.is_empty() {
            return Ok(());
        }

        let _guard = self.locks.lock(user_id).await;
        self.store
            .append_overflow(user_id, remainder)
            .await
            .map_err(|source| OverflowError::StoreFailed {
                user_id: user_id.clone(),
                source,
            })?;

        debug!("queued overflow units");
        Ok(())
    }

    /// Takes the next page from the user's queue.
    ///
    /// Each returned entry is deleted; a failed delete is logged and does not
    /// fail the call.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn drain_next(&self, user_id: &UserId) -> Result<Drained, Report<OverflowError>> {
        let _guard = self.locks.lock(user_id).await;
        let mut entries = self
            .store
            .oldest_overflow(user_id, self.page_size + 1)
            .await
            .map_err(|source| OverflowError::ReadFailed {
                user_id: user_id.clone(),
                source,
            })?;

        if entries.is_empty() {
            debug!("overflow queue is empty");
            return Ok(Drained::NothingMore);
        }

        let has_more = entries.len() > self.page_size;
        entries.truncate(self.page_size);

        for entry in &entries {
            if let Err(e) = self.store.delete_overflow_entry(user_id, entry.id).await {
                warn!(
                    error = %e,
                    entry_id = %entry.id,
                    position = entry.position,
                    "Failed to delete drained overflow entry"
                );
            }
        }

        debug!(count = entries.len(), has_more, "drained overflow page");
        Ok(Drained::Page {
            units: entries.into_iter().map(|entry| entry.unit).collect(),
            has_more,
        })
    }

    /// Drops everything queued for the user.
    pub async fn discard(&self, user_id: &UserId) -> Result<u64, Report<OverflowError>> {
        let _guard = self.locks.lock(user_id).await;
        let removed = self.store.clear_overflow(user_id).await.map_err(|source| {
            OverflowError::ClearFailed {
                user_id: user_id.clone(),
                source,
            }
        })?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::Chip;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockOverflowStore {
        entries: Mutex<HashMap<UserId, Vec<OverflowEntry>>>,
        next_position: Mutex<i64>,
        fail_deletes: bool,
        read_delay: Option<Duration>,
    }

    impl MockOverflowStore {
        fn failing_deletes() -> Self {
            Self {
                fail_deletes: true,
                ..Self::default()
            }
        }

        fn slow_reads(delay: Duration) -> Self {
            Self {
                read_delay: Some(delay),
                ..Self::default()
            }
        }

        fn len(&self, user_id: &UserId) -> usize {
            self.entries
                .lock()
                .unwrap()
                .get(user_id)
                .map_or(0, Vec::len)
        }
    }

    #[async_trait]
    impl OverflowStore for MockOverflowStore {
        async fn append_overflow(
            &self,
            user_id: &UserId,
            units: &[MessageUnit],
        ) -> Result<(), PersistenceError> {
            let mut entries = self.entries.lock().unwrap();
            let mut position = self.next_position.lock().unwrap();
            let queue = entries.entry(user_id.clone()).or_default();
            for unit in units {
                *position += 1;
                queue.push(OverflowEntry {
                    id: OverflowEntryId::new(),
                    position: *position,
                    unit: unit.clone(),
                });
            }
            Ok(())
        }

        async fn oldest_overflow(
            &self,
            user_id: &UserId,
            limit: usize,
        ) -> Result<Vec<OverflowEntry>, PersistenceError> {
            let oldest = self
                .entries
                .lock()
                .unwrap()
                .get(user_id)
                .map(|queue| queue.iter().take(limit).cloned().collect())
                .unwrap_or_default();
            if let Some(delay) = self.read_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(oldest)
        }

        async fn delete_overflow_entry(
            &self,
            user_id: &UserId,
            id: OverflowEntryId,
        ) -> Result<(), PersistenceError> {
            if self.fail_deletes {
                return Err(PersistenceError::DeleteFailed {
                    reason: "injected".to_string(),
                });
            }
            let mut entries = self.entries.lock().unwrap();
            if let Some(queue) = entries.get_mut(user_id) {
                queue.retain(|entry| entry.id != id);
            }
            Ok(())
        }

        async fn clear_overflow(&self, user_id: &UserId) -> Result<u64, PersistenceError> {
            let mut entries = self.entries.lock().unwrap();
            Ok(entries.remove(user_id).map_or(0, |queue| queue.len() as u64))
        }
    }

    fn numbered(count: usize) -> Vec<MessageUnit> {
        (1..=count)
            .map(|i| MessageUnit::text(format!("unit {i}")))
            .collect()
    }

    fn suggestions() -> QuickReply {
        QuickReply::new(vec![Chip::literal("วิธีถ่ายภาพหน้าจอ")])
    }

    fn continue_reply() -> QuickReply {
        QuickReply::continue_reading("อ่านต่อ")
    }

    #[test]
    fn short_reply_fits_on_one_page() {
        let page = paginate(numbered(3), &suggestions(), &continue_reply(), 5);
        assert_eq!(page.delivered.len(), 3);
        assert!(!page.has_remainder());
        assert!(page.delivered.iter().all(|p| p.quick_reply == suggestions()));
    }

    #[test]
    fn exactly_one_page_has_no_continue_chip() {
        let page = paginate(numbered(5), &suggestions(), &continue_reply(), 5);
        assert_eq!(page.delivered.len(), 5);
        assert!(page.remainder.is_empty());
        assert_eq!(page.delivered[4].quick_reply, suggestions());
    }

    #[test]
    fn long_reply_splits_and_marks_last_unit() {
        let units = numbered(12);
        let page = paginate(units.clone(), &suggestions(), &continue_reply(), 5);

        assert_eq!(page.delivered.len(), 5);
        assert_eq!(page.remainder, units[5..].to_vec());

        let delivered: Vec<_> = page.delivered.iter().map(|p| p.unit.clone()).collect();
        assert_eq!(delivered, units[..5].to_vec());

        assert_eq!(page.delivered[4].quick_reply, continue_reply());
        assert!(
            page.delivered[..4]
                .iter()
                .all(|p| p.quick_reply == suggestions())
        );
    }

    #[test]
    fn empty_reply_is_empty_page() {
        let page = paginate(Vec::new(), &suggestions(), &continue_reply(), 5);
        assert!(page.delivered.is_empty());
        assert!(page.remainder.is_empty());
    }

    #[tokio::test]
    async fn drain_serves_pages_in_insertion_order() {
        let store = Arc::new(MockOverflowStore::default());
        let paginator = OverflowPaginator::new(store.clone(), DEFAULT_PAGE_SIZE, "อ่านต่อ");
        let user = UserId::new("U1");
        let units = numbered(12);

        paginator
            .store_remainder(&user, &units)
            .await
            .expect("store remainder");

        let mut served = Vec::new();
        let mut sizes = Vec::new();
        loop {
            match paginator.drain_next(&user).await.expect("drain") {
                Drained::Page { units, has_more } => {
                    sizes.push((units.len(), has_more));
                    served.extend(units);
                }
                Drained::NothingMore => break,
            }
        }

        assert_eq!(sizes, vec![(5, true), (5, true), (2, false)]);
        assert_eq!(served, units);
        assert_eq!(store.len(&user), 0);
    }

    #[tokio::test]
    async fn drain_on_empty_queue_is_nothing_more() {
        let store = Arc::new(MockOverflowStore::default());
        let paginator = OverflowPaginator::new(store, DEFAULT_PAGE_SIZE, "อ่านต่อ");

        let drained = paginator.drain_next(&UserId::new("U1")).await.expect("drain");
        assert_eq!(drained, Drained::NothingMore);
    }

    #[tokio::test]
    async fn remainders_append_after_existing_entries() {
        let store = Arc::new(MockOverflowStore::default());
        let paginator = OverflowPaginator::new(store, 2, "อ่านต่อ");
        let user = UserId::new("U1");

        paginator
            .store_remainder(&user, &[MessageUnit::text("old")])
            .await
            .expect("store");
        paginator
            .store_remainder(&user, &[MessageUnit::text("new")])
            .await
            .expect("store");

        let drained = paginator.drain_next(&user).await.expect("drain");
        assert_eq!(
            drained,
            Drained::Page {
                units: vec![MessageUnit::text("old"), MessageUnit::text("new")],
                has_more: false,
            }
        );
    }

    #[tokio::test]
    async fn failed_delete_still_returns_page() {
        let store = Arc::new(MockOverflowStore::failing_deletes());
        let paginator = OverflowPaginator::new(store.clone(), DEFAULT_PAGE_SIZE, "อ่านต่อ");
        let user = UserId::new("U1");

        paginator
            .store_remainder(&user, &numbered(2))
            .await
            .expect("store");

        let drained = paginator.drain_next(&user).await.expect("drain");
        assert!(matches!(drained, Drained::Page { ref units, .. } if units.len() == 2));
        assert_eq!(store.len(&user), 2);
    }

    #[tokio::test]
    async fn users_have_separate_queues() {
        let store = Arc::new(MockOverflowStore::default());
        let paginator = OverflowPaginator::new(store, DEFAULT_PAGE_SIZE, "อ่านต่อ");

        paginator
            .store_remainder(&UserId::new("U1"), &numbered(1))
            .await
            .expect("store");

        let drained = paginator
            .drain_next(&UserId::new("U2"))
            .await
            .expect("drain");
        assert_eq!(drained, Drained::NothingMore);
    }

    #[tokio::test]
    async fn overlapping_drains_hand_out_each_unit_once() {
        let store = Arc::new(MockOverflowStore::slow_reads(Duration::from_millis(10)));
        let paginator = OverflowPaginator::new(store.clone(), DEFAULT_PAGE_SIZE, "อ่านต่อ");
        let user = UserId::new("U1");
        let units = numbered(7);

        paginator
            .store_remainder(&user, &units)
            .await
            .expect("store");

        let (first, second) = tokio::join!(
            paginator.drain_next(&user),
            paginator.drain_next(&user)
        );

        let mut served = Vec::new();
        for drained in [first.expect("drain"), second.expect("drain")] {
            if let Drained::Page { units, .. } = drained {
                served.extend(units);
            }
        }
        served.sort_by_key(|unit| units.iter().position(|u| u == unit));
        assert_eq!(served, units);
        assert_eq!(store.len(&user), 0);
    }

    #[tokio::test]
    async fn discard_drops_the_queue() {
        let store = Arc::new(MockOverflowStore::default());
        let paginator = OverflowPaginator::new(store.clone(), DEFAULT_PAGE_SIZE, "อ่านต่อ");
        let user = UserId::new("U1");

        paginator
            .store_remainder(&user, &numbered(7))
            .await
            .expect("store");

        assert_eq!(paginator.discard(&user).await.expect("discard"), 7);
        assert_eq!(store.len(&user), 0);
    }

    #[test]
    fn present_marks_last_drained_unit_when_more_remain() {
        let store = Arc::new(MockOverflowStore::default());
        let paginator = OverflowPaginator::new(store, DEFAULT_PAGE_SIZE, "อ่านต่อ");

        let presented = paginator.present(numbered(2), true, &suggestions());
        assert_eq!(presented[0].quick_reply, suggestions());
        assert_eq!(presented[1].quick_reply, continue_reply());

        let presented = paginator.present(numbered(2), false, &suggestions());
        assert_eq!(presented[1].quick_reply, suggestions());
    }
}
