//! The default in-memory slot store.
//!
//! Records are kept in a map keyed by (feed, day), with a secondary
//! (day, feed) index so cleanup can walk the oldest days first without a
//! full scan.

use slotcast_api::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(test)]
mod test;

/// MemSlotStore configuration types.
pub mod config {
    use slotcast_api::DEFAULT_SLOT_CAPACITY;

    /// Configuration parameters for
    /// [MemSlotStoreFactory](super::MemSlotStoreFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct MemSlotStoreConfig {
        /// How long to wait for the store lock before giving up.
        ///
        /// Default: 5000.
        pub lock_timeout_ms: u32,

        /// The number of slots per (feed, day) for new records.
        ///
        /// Default: 1000.
        pub slot_capacity: u32,
    }

    impl Default for MemSlotStoreConfig {
        fn default() -> Self {
            Self {
                lock_timeout_ms: 5000,
                slot_capacity: DEFAULT_SLOT_CAPACITY,
            }
        }
    }

    impl MemSlotStoreConfig {
        /// Get the lock timeout as a [std::time::Duration].
        pub fn lock_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.lock_timeout_ms as u64)
        }
    }

    /// Module-level configuration for MemSlotStore.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct MemSlotStoreModConfig {
        /// MemSlotStore configuration.
        pub mem_slot_store: MemSlotStoreConfig,
    }
}

use config::*;

/// A factory for creating [MemSlotStore] instances.
#[derive(Debug)]
pub struct MemSlotStoreFactory {}

impl MemSlotStoreFactory {
    /// Construct a new MemSlotStoreFactory.
    pub fn create() -> DynSlotStoreFactory {
        let out: DynSlotStoreFactory = Arc::new(MemSlotStoreFactory {});
        out
    }
}

impl SlotStoreFactory for MemSlotStoreFactory {
    fn default_config(&self, config: &Config) -> CastResult<()> {
        config.set_module_config(&MemSlotStoreModConfig::default())
    }

    fn validate_config(&self, config: &Config) -> CastResult<()> {
        let config: MemSlotStoreModConfig = config.get_module_config()?;
        validate_store_limits(
            config.mem_slot_store.lock_timeout_ms,
            config.mem_slot_store.slot_capacity,
        )
    }

    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, CastResult<DynSlotStore>> {
        Box::pin(async move {
            let config: MemSlotStoreModConfig =
                builder.config.get_module_config()?;
            let out: DynSlotStore =
                Arc::new(MemSlotStore::new(config.mem_slot_store));
            Ok(out)
        })
    }
}

pub(crate) fn validate_store_limits(
    lock_timeout_ms: u32,
    slot_capacity: u32,
) -> CastResult<()> {
    if lock_timeout_ms == 0 {
        return Err(CastError::other("lockTimeoutMs must be greater than 0"));
    }
    if slot_capacity == 0 {
        return Err(CastError::other("slotCapacity must be greater than 0"));
    }
    Ok(())
}

/// The record table shared by the in-memory and file-backed stores.
#[derive(Debug, Default)]
pub(crate) struct SlotTable {
    by_key: BTreeMap<(FeedId, Day), IndexSlot>,
    by_day: BTreeSet<(Day, FeedId)>,
}

impl SlotTable {
    /// Rebuild a table from previously persisted records.
    pub fn from_slots(slots: Vec<IndexSlot>) -> CastResult<Self> {
        let mut out = Self::default();
        for slot in slots {
            out.upsert(slot)?;
        }
        Ok(out)
    }

    /// A persisted copy of the record, if any.
    pub fn get(&self, feed: FeedId, day: Day) -> Option<IndexSlot> {
        self.by_key.get(&(feed, day)).cloned()
    }

    /// Insert or merge a record. Returns true if anything changed.
    pub fn upsert(&mut self, mut slot: IndexSlot) -> CastResult<bool> {
        use std::collections::btree_map::Entry;

        let key = (slot.feed(), slot.day());
        match self.by_key.entry(key) {
            Entry::Occupied(mut e) => {
                let changed = e.get_mut().merge(&slot)?;
                e.get_mut().mark_persisted();
                Ok(changed)
            }
            Entry::Vacant(e) => {
                slot.mark_persisted();
                e.insert(slot);
                self.by_day.insert((key.1, key.0));
                Ok(true)
            }
        }
    }

    /// Remove every record with a day before `horizon`.
    pub fn remove_before(&mut self, horizon: Day) -> usize {
        let doomed: Vec<(Day, FeedId)> = self
            .by_day
            .range(..(horizon, FeedId(i64::MIN)))
            .copied()
            .collect();
        for (day, feed) in doomed.iter() {
            self.by_day.remove(&(*day, *feed));
            self.by_key.remove(&(*feed, *day));
        }
        doomed.len()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn slots(&self) -> impl Iterator<Item = &IndexSlot> {
        self.by_key.values()
    }
}

/// An in-memory [SlotStore]. Records are lost when the process exits.
#[derive(Debug)]
pub struct MemSlotStore {
    config: MemSlotStoreConfig,
    inner: RwLock<SlotTable>,
}

impl MemSlotStore {
    /// Construct a new, empty store.
    pub fn new(config: MemSlotStoreConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(SlotTable::default()),
        }
    }

    /// The number of records currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// True if no records are held.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl SlotStore for MemSlotStore {
    fn get_or_create(
        &self,
        feed: FeedId,
        day: Day,
    ) -> BoxFut<'_, CastResult<IndexSlot>> {
        Box::pin(async move {
            let fresh = || {
                IndexSlot::with_capacity(feed, day, self.config.slot_capacity)
            };
            match tokio::time::timeout(
                self.config.lock_timeout(),
                self.inner.read(),
            )
            .await
            {
                Ok(table) => Ok(table.get(feed, day).unwrap_or_else(fresh)),
                Err(_) => {
                    tracing::warn!(
                        %feed,
                        %day,
                        "slot store lock timed out, using a disposable slot"
                    );
                    Ok(fresh())
                }
            }
        })
    }

    fn store(&self, slot: IndexSlot) -> BoxFut<'_, CastResult<()>> {
        Box::pin(async move {
            let mut table = tokio::time::timeout(
                self.config.lock_timeout(),
                self.inner.write(),
            )
            .await
            .map_err(|_| CastError::busy("slot store lock timed out"))?;
            table.upsert(slot)?;
            Ok(())
        })
    }

    fn cleanup(&self, max_days_old: u32) -> BoxFut<'_, CastResult<usize>> {
        self.cleanup_before(cleanup_horizon(Day::today(), max_days_old))
    }

    fn cleanup_before(&self, horizon: Day) -> BoxFut<'_, CastResult<usize>> {
        Box::pin(async move {
            let mut table = tokio::time::timeout(
                self.config.lock_timeout(),
                self.inner.write(),
            )
            .await
            .map_err(|_| CastError::busy("slot store lock timed out"))?;
            let removed = table.remove_before(horizon);
            tracing::debug!(%horizon, removed, "slot store cleanup");
            Ok(removed)
        })
    }
}
