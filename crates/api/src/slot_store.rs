//! Slot store related types.

use crate::*;
use std::sync::Arc;

/// A durable map of (feed, day) to [IndexSlot].
///
/// Implementations guard their state with two lock modes. Readers take a
/// cooperative (shared) lock, writers and cleanup take an exclusive lock.
/// Lock acquisition is bounded: a writer that cannot get the lock in time
/// gets [CastError::Busy] and nothing is written.
///
/// Slots returned by the store are short-lived views. Callers mutate them
/// and hand them back via [SlotStore::store], which unions the bits into
/// the persisted record. A stale or disposable view can therefore never
/// clear a bit that was set elsewhere.
pub trait SlotStore: 'static + Send + Sync + std::fmt::Debug {
    /// Look up the record for a (feed, day) pair.
    ///
    /// If none exists a fresh, transient record is returned, it is not
    /// persisted until passed to [SlotStore::store].
    ///
    /// If the cooperative lock cannot be acquired in time, a disposable
    /// transient record is returned and the degradation is logged. Progress
    /// recorded against such a record is best-effort.
    fn get_or_create(
        &self,
        feed: FeedId,
        day: Day,
    ) -> BoxFut<'_, CastResult<IndexSlot>>;

    /// Persist a record, inserting it if new or merging it into the
    /// existing record. Takes the exclusive lock.
    fn store(&self, slot: IndexSlot) -> BoxFut<'_, CastResult<()>>;

    /// Delete every record whose day precedes
    /// `today - (max_days_old + 1)` days. Returns the number removed.
    /// Takes the exclusive lock.
    fn cleanup(&self, max_days_old: u32) -> BoxFut<'_, CastResult<usize>>;

    /// Like [SlotStore::cleanup] but with an explicit horizon: every record
    /// with a day strictly before `horizon` is removed.
    fn cleanup_before(&self, horizon: Day) -> BoxFut<'_, CastResult<usize>>;
}

/// Trait-object [SlotStore].
pub type DynSlotStore = Arc<dyn SlotStore>;

/// The horizon used by [SlotStore::cleanup] for a given `today`.
pub fn cleanup_horizon(today: Day, max_days_old: u32) -> Day {
    today.days_before(max_days_old.saturating_add(1))
}

/// A factory for constructing [SlotStore] instances.
pub trait SlotStoreFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &Config) -> CastResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &Config) -> CastResult<()>;

    /// Construct (or open) a slot store instance.
    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, CastResult<DynSlotStore>>;
}

/// Trait-object [SlotStoreFactory].
pub type DynSlotStoreFactory = Arc<dyn SlotStoreFactory>;

/// Persist `slot` if it has unpersisted changes.
///
/// On failure the record stays dirty, so a later call stores it again.
/// The store merges bits, so a retried record never loses slots.
pub async fn persist_slot(
    store: &DynSlotStore,
    slot: &mut IndexSlot,
) -> CastResult<()> {
    if !slot.is_dirty() {
        return Ok(());
    }
    store.store(slot.clone()).await?;
    slot.mark_persisted();
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn horizon_is_one_day_past_retention() {
        let today = Day::from_ymd(2026, 10, 16).unwrap();
        let horizon = Day::from_ymd(2026, 9, 15).unwrap();
        assert_eq!(horizon, cleanup_horizon(today, 30));
        assert_eq!(today.days_before(1), cleanup_horizon(today, 0));
    }
}
