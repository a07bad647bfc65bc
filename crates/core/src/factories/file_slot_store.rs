//! A slot store that survives restarts.
//!
//! The whole table is written to a single JSON journal after every change.
//! Writes go to a temporary sibling file which is then renamed over the
//! journal, so a crash leaves either the old or the new table on disk.

use super::mem_slot_store::{validate_store_limits, SlotTable};
use slotcast_api::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[cfg(test)]
mod test;

/// FileSlotStore configuration types.
pub mod config {
    use slotcast_api::DEFAULT_SLOT_CAPACITY;

    /// Configuration parameters for
    /// [FileSlotStoreFactory](super::FileSlotStoreFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct FileSlotStoreConfig {
        /// The journal file.
        ///
        /// Default: "slotcast-slots.json".
        pub path: String,

        /// How long to wait for the store lock before giving up.
        ///
        /// Default: 5000.
        pub lock_timeout_ms: u32,

        /// The number of slots per (feed, day) for new records.
        ///
        /// Default: 1000.
        pub slot_capacity: u32,
    }

    impl Default for FileSlotStoreConfig {
        fn default() -> Self {
            Self {
                path: "slotcast-slots.json".into(),
                lock_timeout_ms: 5000,
                slot_capacity: DEFAULT_SLOT_CAPACITY,
            }
        }
    }

    impl FileSlotStoreConfig {
        /// Get the lock timeout as a [std::time::Duration].
        pub fn lock_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.lock_timeout_ms as u64)
        }
    }

    /// Module-level configuration for FileSlotStore.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct FileSlotStoreModConfig {
        /// FileSlotStore configuration.
        pub file_slot_store: FileSlotStoreConfig,
    }
}

use config::*;

/// A factory for creating [FileSlotStore] instances.
#[derive(Debug)]
pub struct FileSlotStoreFactory {}

impl FileSlotStoreFactory {
    /// Construct a new FileSlotStoreFactory.
    pub fn create() -> DynSlotStoreFactory {
        let out: DynSlotStoreFactory = Arc::new(FileSlotStoreFactory {});
        out
    }
}

impl SlotStoreFactory for FileSlotStoreFactory {
    fn default_config(&self, config: &Config) -> CastResult<()> {
        config.set_module_config(&FileSlotStoreModConfig::default())
    }

    fn validate_config(&self, config: &Config) -> CastResult<()> {
        let config: FileSlotStoreModConfig = config.get_module_config()?;
        if config.file_slot_store.path.is_empty() {
            return Err(CastError::other("fileSlotStore path must be set"));
        }
        validate_store_limits(
            config.file_slot_store.lock_timeout_ms,
            config.file_slot_store.slot_capacity,
        )
    }

    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, CastResult<DynSlotStore>> {
        Box::pin(async move {
            let config: FileSlotStoreModConfig =
                builder.config.get_module_config()?;
            let out: DynSlotStore =
                Arc::new(FileSlotStore::open(config.file_slot_store).await?);
            Ok(out)
        })
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Journal {
    version: u32,
    slots: Vec<IndexSlot>,
}

const JOURNAL_VERSION: u32 = 1;

/// A [SlotStore] persisted to a JSON journal file.
#[derive(Debug)]
pub struct FileSlotStore {
    config: FileSlotStoreConfig,
    path: PathBuf,
    inner: RwLock<SlotTable>,
    // set while the table holds changes the journal is missing
    unwritten: AtomicBool,
}

impl FileSlotStore {
    /// Open the journal at the configured path, starting empty if it does
    /// not exist yet.
    pub async fn open(config: FileSlotStoreConfig) -> CastResult<Self> {
        let path = PathBuf::from(&config.path);
        let table = match tokio::fs::read(&path).await {
            Ok(data) => {
                let journal: Journal = serde_json::from_slice(&data)
                    .map_err(|e| {
                        CastError::other_src(
                            format!("corrupt slot journal {}", path.display()),
                            e,
                        )
                    })?;
                if journal.version != JOURNAL_VERSION {
                    return Err(CastError::other(format!(
                        "unsupported slot journal version {}",
                        journal.version
                    )));
                }
                SlotTable::from_slots(journal.slots)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                SlotTable::default()
            }
            Err(err) => {
                return Err(CastError::other_src(
                    format!("read slot journal {}", path.display()),
                    err,
                ))
            }
        };
        tracing::info!(
            path = %path.display(),
            records = table.len(),
            "opened slot store"
        );
        Ok(Self {
            config,
            path,
            inner: RwLock::new(table),
            unwritten: AtomicBool::new(false),
        })
    }

    /// The number of records currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// True if no records are held.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn write_journal(&self, table: &SlotTable) -> CastResult<()> {
        self.unwritten.store(true, Ordering::Release);
        let journal = Journal {
            version: JOURNAL_VERSION,
            slots: table.slots().cloned().collect(),
        };
        let data = serde_json::to_vec(&journal)
            .map_err(|e| CastError::other_src("encode slot journal", e))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, data).await.map_err(|e| {
            CastError::other_src(format!("write {}", tmp.display()), e)
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            CastError::other_src(format!("replace {}", self.path.display()), e)
        })?;
        self.unwritten.store(false, Ordering::Release);
        Ok(())
    }
}

impl SlotStore for FileSlotStore {
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
            let changed = table.upsert(slot)?;
            if changed || self.unwritten.load(Ordering::Acquire) {
                self.write_journal(&table).await?;
            }
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
            if removed > 0 || self.unwritten.load(Ordering::Acquire) {
                self.write_journal(&table).await?;
            }
            tracing::debug!(%horizon, removed, "slot store cleanup");
            Ok(removed)
        })
    }
}
