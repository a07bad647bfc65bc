//! The upload side of a slotted feed.
//!
//! An upload cycle collects pending items into one bulletin and inserts it
//! at the first slot of today we have not used. Every insert is verified
//! by reading the slot back. The network gives no durability guarantee for
//! a single insert, so the same payload is inserted and verified
//! `required_insertions` times at the same index before the slot is
//! recorded as used.
//!
//! A key collision means another node already published at that index.
//! The cycle moves on to the next free index without spending a try.

use slotcast_api::*;
use std::sync::Arc;


/// CoreUpload configuration types.
pub mod config {
    /// Configuration parameters for [CoreUpload](super::CoreUpload).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct CoreUploadConfig {
        /// Tries per upload cycle. Failed inserts and failed verifies
        /// each spend one.
        ///
        /// Default: 10.
        pub max_tries: u32,

        /// Pause after a failed insert or verify.
        ///
        /// Default: 15000.
        pub retry_backoff_ms: u32,

        /// Pause after a key collision before trying the next index.
        ///
        /// Default: 5000.
        pub collision_delay_ms: u32,

        /// Verified inserts at the same index before the slot counts as
        /// published.
        ///
        /// Default: 2.
        pub required_insertions: u32,

        /// Pending items per bulletin.
        ///
        /// Default: 250.
        pub max_items_per_bulletin: u32,

        /// Skip pending items older than this many days.
        ///
        /// Default: unlimited.
        pub max_item_age_days: Option<u32>,

        /// Retries the transport may spend on a verify read.
        ///
        /// Default: 2.
        pub verify_max_retries: u32,
    }

    impl Default for CoreUploadConfig {
        fn default() -> Self {
            Self {
                max_tries: 10,
                retry_backoff_ms: 15000,
                collision_delay_ms: 5000,
                required_insertions: 2,
                max_items_per_bulletin: 250,
                max_item_age_days: None,
                verify_max_retries: 2,
            }
        }
    }

    impl CoreUploadConfig {
        /// Get the retry backoff as a [std::time::Duration].
        pub fn retry_backoff(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.retry_backoff_ms as u64)
        }

        /// Get the collision delay as a [std::time::Duration].
        pub fn collision_delay(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.collision_delay_ms as u64)
        }
    }

    /// Module-level configuration for CoreUpload.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct CoreUploadModConfig {
        /// CoreUpload configuration.
        pub core_upload: CoreUploadConfig,
    }
}

pub use config::*;

/// The outcome of one upload cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReport {
    /// No items were pending.
    NothingToSend,

    /// The bulletin was durably published.
    Published {
        /// The slot it was published at.
        index: u32,

        /// The items it carried. They have not been acknowledged yet.
        items: Vec<PendingItem>,
    },

    /// The cycle gave up.
    Failed {
        /// Why.
        failure: UploadFailure,

        /// The items that were not published.
        items: Vec<PendingItem>,
    },
}

/// Publishes pending items into today's slots.
#[derive(Debug)]
pub struct CoreUpload {
    config: CoreUploadConfig,
    feed: FeedSpec,
    store: DynSlotStore,
    transport: DynTransport,
    codec: DynBulletinCodec,
    source: DynContentSource,
}

impl CoreUpload {
    /// Construct a new upload driver for `feed`.
    pub fn new(
        config: CoreUploadConfig,
        feed: FeedSpec,
        store: DynSlotStore,
        transport: DynTransport,
        codec: DynBulletinCodec,
        source: DynContentSource,
    ) -> Self {
        Self {
            config,
            feed,
            store,
            transport,
            codec,
            source,
        }
    }

    /// Validate an upload configuration.
    pub fn validate_config(config: &CoreUploadConfig) -> CastResult<()> {
        if config.max_tries == 0 {
            return Err(CastError::other("maxTries must be greater than 0"));
        }
        if config.required_insertions == 0 {
            return Err(CastError::other(
                "requiredInsertions must be greater than 0",
            ));
        }
        if config.max_items_per_bulletin == 0 {
            return Err(CastError::other(
                "maxItemsPerBulletin must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Run one upload cycle into the slots of `day`.
    ///
    /// Items are only selected here. The caller acknowledges them once it
    /// has seen [UploadReport::Published].
    pub async fn upload(&self, day: Day) -> CastResult<UploadReport> {
        let feed_id = self.feed.feed_id;
        let not_older_than = self.config.max_item_age_days.map(|days| {
            Timestamp::now()
                - std::time::Duration::from_secs(days as u64 * 60 * 60 * 24)
        });
        let items = self
            .source
            .select_pending_items(
                feed_id,
                self.config.max_items_per_bulletin as usize,
                not_older_than,
            )
            .await?;
        if items.is_empty() {
            return Ok(UploadReport::NothingToSend);
        }

        let bulletin = Bulletin {
            published_at: Timestamp::now(),
            publisher: self.feed.publisher.clone(),
            entries: items.iter().map(|i| i.entry.clone()).collect(),
        };
        let payload = self.codec.encode(&bulletin)?;

        let mut slot = self.store.get_or_create(feed_id, day).await?;
        match self.insert(&slot, payload).await {
            Ok(index) => {
                slot.set_upload_slot_used(index);
                persist_slot(&self.store, &mut slot).await?;
                tracing::info!(
                    feed = %feed_id,
                    %day,
                    index,
                    items = items.len(),
                    "published bulletin"
                );
                Ok(UploadReport::Published { index, items })
            }
            Err(failure) => {
                tracing::warn!(
                    feed = %feed_id,
                    %day,
                    ?failure,
                    "upload failed"
                );
                Ok(UploadReport::Failed { failure, items })
            }
        }
    }

    async fn insert(
        &self,
        slot: &IndexSlot,
        payload: bytes::Bytes,
    ) -> Result<u32, UploadFailure> {
        let day = slot.day();
        let mut index = slot
            .find_first_upload_slot()
            .ok_or(UploadFailure::DayFull)?;
        let mut tries = 0;
        let mut insertions = 0;

        loop {
            if tries >= self.config.max_tries {
                return Err(UploadFailure::TriesExhausted { last_index: index });
            }

            let name = self.feed.slot_name(day, index).to_string();
            match self.transport.put(name.clone(), payload.clone()).await {
                UploadOutcome::Success => {
                    if self.verify(&name, &payload).await {
                        insertions += 1;
                        tracing::debug!(%name, insertions, "insert verified");
                        if insertions >= self.config.required_insertions {
                            return Ok(index);
                        }
                    } else {
                        tries += 1;
                        tracing::debug!(%name, tries, "verify failed");
                        tokio::time::sleep(self.config.retry_backoff()).await;
                    }
                }
                UploadOutcome::KeyCollision => {
                    insertions = 0;
                    index = slot
                        .find_next_upload_slot(index)
                        .ok_or(UploadFailure::DayFull)?;
                    tracing::debug!(%name, next = index, "key collision");
                    tokio::time::sleep(self.config.collision_delay()).await;
                }
                UploadOutcome::NoConnection => {
                    return Err(UploadFailure::NoConnection);
                }
                other => {
                    tries += 1;
                    tracing::debug!(%name, tries, ?other, "insert failed");
                    tokio::time::sleep(self.config.retry_backoff()).await;
                }
            }
        }
    }

    async fn verify(&self, name: &str, payload: &bytes::Bytes) -> bool {
        match self
            .transport
            .get(
                name.to_string(),
                payload.len() as u64,
                self.config.verify_max_retries,
            )
            .await
        {
            DownloadOutcome::Success(data) => data == *payload,
            _ => false,
        }
    }
}

/// The decider for hosts without a user to ask: failed content stays
/// pending and the next iteration retries it.
#[derive(Debug, Default)]
pub struct AutomaticRetry;

impl AutomaticRetry {
    /// Construct a new AutomaticRetry decider.
    pub fn create() -> DynUploadFailureDecider {
        let out: DynUploadFailureDecider = Arc::new(AutomaticRetry);
        out
    }
}

impl UploadFailureDecider for AutomaticRetry {
    fn decide(
        &self,
        _feed: &FeedSpec,
        _failure: &UploadFailure,
        _items: &[PendingItem],
    ) -> BoxFut<'_, FailureDecision> {
        Box::pin(async move { FailureDecision::RetryNextIteration })
    }
}
