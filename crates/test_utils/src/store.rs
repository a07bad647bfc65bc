//! A test slot store.

use slotcast_api::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A [SlotStore] that reads through to `inner` but whose writer lock is
/// never available: every [SlotStore::store] fails with
/// [CastError::Busy].
#[derive(Debug)]
pub struct BusySlotStore {
    inner: DynSlotStore,
    refused: AtomicUsize,
}

impl BusySlotStore {
    /// Wrap `inner`.
    pub fn create(inner: DynSlotStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            refused: AtomicUsize::new(0),
        })
    }

    /// How many writes were refused so far.
    pub fn refused(&self) -> usize {
        self.refused.load(Ordering::SeqCst)
    }
}

impl SlotStore for BusySlotStore {
    fn get_or_create(
        &self,
        feed: FeedId,
        day: Day,
    ) -> BoxFut<'_, CastResult<IndexSlot>> {
        self.inner.get_or_create(feed, day)
    }

    fn store(&self, slot: IndexSlot) -> BoxFut<'_, CastResult<()>> {
        self.refused.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Err(CastError::busy(format!(
                "slot store locked, dropping {}/{}",
                slot.feed(),
                slot.day()
            )))
        })
    }

    fn cleanup(&self, max_days_old: u32) -> BoxFut<'_, CastResult<usize>> {
        self.inner.cleanup(max_days_old)
    }

    fn cleanup_before(&self, horizon: Day) -> BoxFut<'_, CastResult<usize>> {
        self.inner.cleanup_before(horizon)
    }
}
