//! The download side of a slotted feed.
//!
//! A scan walks the slots of one day in ascending index order, starting at
//! the first slot not yet tried. Every slot that yields a definitive
//! outcome is marked tried and the record is persisted right away, so no
//! slot is fetched twice even across restarts.
//!
//! Empty slots are where the scan has to guess. A slot at or below the
//! highest index known to hold content is a gap in a backlog that exists,
//! so it does not count against the scan. A slot past that mark may just
//! not be published yet, and too many of those in a row end the scan for
//! the day. Days with no known content count every empty slot.

use rand::Rng;
use slotcast_api::*;


/// CoreScanner configuration types.
pub mod config {
    /// Configuration parameters for [CoreScanner](super::CoreScanner).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct CoreScannerConfig {
        /// Consecutive empty slots past the frontier that end a scan of
        /// today.
        ///
        /// Default: 3.
        pub max_failures_today: u32,

        /// Consecutive empty slots past the frontier that end a scan of a
        /// past day.
        ///
        /// Default: 2.
        pub max_failures_backlog: u32,

        /// Lower bound of the randomized pause before each request.
        ///
        /// Default: 1000.
        pub request_delay_min_ms: u32,

        /// Upper bound of the randomized pause before each request.
        ///
        /// Default: 10000.
        pub request_delay_max_ms: u32,

        /// Mark empty slots as tried so they are never requested again.
        ///
        /// Default: false.
        pub quickly_fail_on_not_found: bool,

        /// Content larger than this is not downloaded.
        ///
        /// Default: 1 MiB.
        pub max_download_size: u64,

        /// Retries the transport may spend on a single request.
        ///
        /// Default: 2.
        pub transport_max_retries: u32,
    }

    impl Default for CoreScannerConfig {
        fn default() -> Self {
            Self {
                max_failures_today: 3,
                max_failures_backlog: 2,
                request_delay_min_ms: 1000,
                request_delay_max_ms: 10000,
                quickly_fail_on_not_found: false,
                max_download_size: 1024 * 1024,
                transport_max_retries: 2,
            }
        }
    }

    /// Module-level configuration for CoreScanner.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct CoreScannerModConfig {
        /// CoreScanner configuration.
        pub core_scanner: CoreScannerConfig,
    }
}

pub use config::*;

/// Why a day scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEnd {
    /// Too many empty slots past the known content.
    FailureLimit,

    /// Every slot of the day has been tried.
    Exhausted,

    /// The transport reported no connection.
    NoConnection,
}

/// The outcome of scanning one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayScanReport {
    /// The day scanned.
    pub day: Day,

    /// Transport requests made.
    pub requests: u32,

    /// Bulletins the sink accepted.
    pub received: u32,

    /// Bulletins that failed to decode or were refused by the sink.
    pub rejected: u32,

    /// Slots whose content exceeded the size limit.
    pub too_big: u32,

    /// Why the scan stopped.
    pub end: ScanEnd,
}

/// Scans the slots of a feed for new bulletins.
#[derive(Debug)]
pub struct CoreScanner {
    config: CoreScannerConfig,
    feed: FeedSpec,
    store: DynSlotStore,
    transport: DynTransport,
    codec: DynBulletinCodec,
    sink: DynContentSink,
}

impl CoreScanner {
    /// Construct a new scanner for `feed`.
    pub fn new(
        config: CoreScannerConfig,
        feed: FeedSpec,
        store: DynSlotStore,
        transport: DynTransport,
        codec: DynBulletinCodec,
        sink: DynContentSink,
    ) -> Self {
        Self {
            config,
            feed,
            store,
            transport,
            codec,
            sink,
        }
    }

    /// Validate a scanner configuration.
    pub fn validate_config(config: &CoreScannerConfig) -> CastResult<()> {
        if config.request_delay_min_ms > config.request_delay_max_ms {
            return Err(CastError::other(
                "requestDelayMinMs must not exceed requestDelayMaxMs",
            ));
        }
        if config.max_failures_today == 0 || config.max_failures_backlog == 0
        {
            return Err(CastError::other("maxFailures must be greater than 0"));
        }
        Ok(())
    }

    /// The feed this scanner serves.
    pub fn feed(&self) -> &FeedSpec {
        &self.feed
    }

    /// Scan the slots of `day`. `is_today` selects the failure limit.
    pub async fn scan_day(
        &self,
        day: Day,
        is_today: bool,
    ) -> CastResult<DayScanReport> {
        let feed_id = self.feed.feed_id;
        let mut slot = self.store.get_or_create(feed_id, day).await?;
        let max_failures = if is_today {
            self.config.max_failures_today
        } else {
            self.config.max_failures_backlog
        };

        let mut report = DayScanReport {
            day,
            requests: 0,
            received: 0,
            rejected: 0,
            too_big: 0,
            end: ScanEnd::Exhausted,
        };
        let mut failures = 0;
        let mut next = slot.find_first_download_slot();

        report.end = loop {
            let Some(index) = next else {
                break ScanEnd::Exhausted;
            };
            if failures >= max_failures {
                break ScanEnd::FailureLimit;
            }

            tokio::time::sleep(self.request_delay()).await;

            let name = self.feed.slot_name(day, index);
            report.requests += 1;
            match self
                .transport
                .get(
                    name.to_string(),
                    self.config.max_download_size,
                    self.config.transport_max_retries,
                )
                .await
            {
                DownloadOutcome::Success(data) => {
                    slot.set_download_slot_used(index);
                    slot.mark_content_seen(index);
                    self.checkpoint(&mut slot).await;
                    failures = 0;
                    if self.deliver(&name, &data).await {
                        report.received += 1;
                    } else {
                        report.rejected += 1;
                    }
                }
                DownloadOutcome::TooBig => {
                    tracing::warn!(%name, "slot content too big, skipping");
                    slot.set_download_slot_used(index);
                    slot.mark_content_seen(index);
                    self.checkpoint(&mut slot).await;
                    failures = 0;
                    report.too_big += 1;
                }
                DownloadOutcome::NoConnection => {
                    tracing::warn!(%name, "no connection, aborting scan");
                    break ScanEnd::NoConnection;
                }
                other => {
                    if let DownloadOutcome::RouteFailure
                    | DownloadOutcome::OtherError(_) = &other
                    {
                        tracing::debug!(%name, ?other, "slot request failed");
                    }
                    if !slot.is_download_index_behind_last_set_index(index) {
                        failures += 1;
                    }
                    if self.config.quickly_fail_on_not_found {
                        slot.set_download_slot_used(index);
                        self.checkpoint(&mut slot).await;
                    }
                }
            }

            next = slot.find_next_download_slot(index);
        };

        persist_slot(&self.store, &mut slot).await?;

        tracing::debug!(
            feed = %feed_id,
            %day,
            requests = report.requests,
            received = report.received,
            end = ?report.end,
            "day scan complete"
        );
        Ok(report)
    }

    /// Persist mid-scan progress. A failure is retried by the next
    /// checkpoint or by the final persist of the scan.
    async fn checkpoint(&self, slot: &mut IndexSlot) {
        if let Err(err) = persist_slot(&self.store, slot).await {
            tracing::warn!(
                feed = %slot.feed(),
                day = %slot.day(),
                ?err,
                "could not persist scan progress"
            );
        }
    }

    fn request_delay(&self) -> std::time::Duration {
        let min = self.config.request_delay_min_ms;
        let max = self.config.request_delay_max_ms.max(min);
        let ms = rand::thread_rng().gen_range(min..=max);
        std::time::Duration::from_millis(ms as u64)
    }

    async fn deliver(&self, name: &SlotName, data: &[u8]) -> bool {
        match self.codec.decode(data) {
            Ok(bulletin) => self.sink.apply(self.feed.kind, bulletin).await,
            Err(err) => {
                tracing::warn!(%name, ?err, "undecodable bulletin");
                false
            }
        }
    }
}
