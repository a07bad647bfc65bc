//! The periodic loop driving one feed, and the supervisor owning the loops.
//!
//! Each iteration scans a window of days ending today, newest first, and
//! runs one upload cycle right after today's scan. The first
//! `full_backload_iterations` iterations after start scan the full
//! backfill window, later iterations only the last `steady_state_days`.
//!
//! Cancellation is cooperative. It is checked between days and before
//! each iteration, and it interrupts the sleep between iterations. A scan
//! or upload in flight always runs to completion so no slot progress is
//! lost.

use super::core_scanner::{
    CoreScanner, CoreScannerConfig, CoreScannerModConfig, DayScanReport,
    ScanEnd,
};
use super::core_upload::{
    CoreUpload, CoreUploadConfig, CoreUploadModConfig, UploadReport,
};
use slotcast_api::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::Instrument;


/// CoreScheduler configuration types.
pub mod config {
    /// Configuration parameters for [FeedWorker](super::FeedWorker).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct CoreSchedulerConfig {
        /// Pause between iterations.
        ///
        /// Default: 10 minutes.
        pub interval_ms: u64,

        /// Past days scanned during the full backload.
        ///
        /// Default: 5.
        pub max_backfill_days: u32,

        /// Iterations after start that scan the full backload.
        ///
        /// Default: 2.
        pub full_backload_iterations: u32,

        /// Days scanned per iteration once the backload is done, today
        /// included.
        ///
        /// Default: 2.
        pub steady_state_days: u32,

        /// The worker stops for good after more than this many failed
        /// iterations in a row.
        ///
        /// Default: 5.
        pub max_consecutive_failures: u32,

        /// Slot records older than this many days are removed at start.
        ///
        /// Default: 30.
        pub retention_days: u32,
    }

    impl Default for CoreSchedulerConfig {
        fn default() -> Self {
            Self {
                interval_ms: 1000 * 60 * 10,
                max_backfill_days: 5,
                full_backload_iterations: 2,
                steady_state_days: 2,
                max_consecutive_failures: 5,
                retention_days: 30,
            }
        }
    }

    impl CoreSchedulerConfig {
        /// Get the iteration interval as a [std::time::Duration].
        pub fn interval(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.interval_ms)
        }
    }

    /// Module-level configuration for CoreScheduler.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct CoreSchedulerModConfig {
        /// CoreScheduler configuration.
        pub core_scheduler: CoreSchedulerConfig,
    }
}

pub use config::*;

/// Everything a feed worker talks to.
#[derive(Debug, Clone)]
pub struct FeedCollaborators {
    /// Slot bookkeeping.
    pub store: DynSlotStore,

    /// The network.
    pub transport: DynTransport,

    /// Where upload content comes from.
    pub source: DynContentSource,

    /// Where downloaded bulletins go.
    pub sink: DynContentSink,

    /// Who decides about failed uploads.
    pub decider: DynUploadFailureDecider,
}

impl FeedCollaborators {
    /// Create the store and transport through the builder's factories.
    pub async fn from_builder(
        builder: &Arc<Builder>,
        source: DynContentSource,
        sink: DynContentSink,
        decider: DynUploadFailureDecider,
    ) -> CastResult<Self> {
        let store = builder.slot_store.create(builder.clone()).await?;
        let transport = builder.transport.create(builder.clone()).await?;
        Ok(Self {
            store,
            transport,
            source,
            sink,
            decider,
        })
    }
}

/// What the upload cycle of an iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSummary {
    /// No items were pending.
    NothingToSend,

    /// A bulletin was published and its items acknowledged.
    Published {
        /// The slot index used.
        index: u32,

        /// The number of items acknowledged.
        items: usize,
    },

    /// The upload failed and the decider was consulted.
    Failed {
        /// Why the upload failed.
        failure: UploadFailure,

        /// What was decided about the items.
        decision: FailureDecision,
    },
}

/// The outcome of one scheduler iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationReport {
    /// The day treated as today.
    pub today: Day,

    /// One report per scanned day, newest first.
    pub days: Vec<DayScanReport>,

    /// The upload cycle, if it ran.
    pub upload: Option<UploadSummary>,

    /// True if the iteration stopped early on a cancel request.
    pub cancelled: bool,
}

impl IterationReport {
    /// The number of days scanned.
    pub fn days_scanned(&self) -> usize {
        self.days.len()
    }

    /// Bulletins accepted across all days.
    pub fn received(&self) -> u32 {
        self.days.iter().map(|d| d.received).sum()
    }

    /// True if a scan stopped for lack of a connection.
    pub fn no_connection(&self) -> bool {
        self.days.iter().any(|d| d.end == ScanEnd::NoConnection)
    }
}

/// How a worker loop ended.
#[derive(Debug, Clone)]
pub enum WorkerExit {
    /// Cancelled.
    Stopped,

    /// Too many iterations failed in a row.
    Fatal {
        /// Failed iterations in a row.
        failures: u32,

        /// The error of the last failed iteration.
        last_error: CastError,
    },
}

/// The periodic loop of one feed.
#[derive(Debug)]
pub struct FeedWorker {
    config: CoreSchedulerConfig,
    feed: FeedSpec,
    scanner: CoreScanner,
    upload: CoreUpload,
    store: DynSlotStore,
    source: DynContentSource,
    decider: DynUploadFailureDecider,
    full_backload_remaining: u32,
    last_report: Option<IterationReport>,
}

/// Read the scheduler, scanner and upload module configs.
pub fn worker_configs(
    config: &Config,
) -> CastResult<(CoreSchedulerConfig, CoreScannerConfig, CoreUploadConfig)> {
    let scheduler: CoreSchedulerModConfig = config.get_module_config()?;
    let scanner: CoreScannerModConfig = config.get_module_config()?;
    let upload: CoreUploadModConfig = config.get_module_config()?;
    Ok((
        scheduler.core_scheduler,
        scanner.core_scanner,
        upload.core_upload,
    ))
}

impl FeedWorker {
    /// Check the configs a worker is built from.
    pub fn validate_config(
        config: &CoreSchedulerConfig,
        scanner_config: &CoreScannerConfig,
        upload_config: &CoreUploadConfig,
    ) -> CastResult<()> {
        if config.steady_state_days == 0 {
            return Err(CastError::other(
                "steadyStateDays must be greater than 0",
            ));
        }
        CoreScanner::validate_config(scanner_config)?;
        CoreUpload::validate_config(upload_config)
    }

    /// Construct a worker from explicit module configs.
    pub fn new(
        config: CoreSchedulerConfig,
        scanner_config: CoreScannerConfig,
        upload_config: CoreUploadConfig,
        codec: DynBulletinCodec,
        feed: FeedSpec,
        collab: FeedCollaborators,
    ) -> CastResult<Self> {
        Self::validate_config(&config, &scanner_config, &upload_config)?;
        let scanner = CoreScanner::new(
            scanner_config,
            feed.clone(),
            collab.store.clone(),
            collab.transport.clone(),
            codec.clone(),
            collab.sink.clone(),
        );
        let upload = CoreUpload::new(
            upload_config,
            feed.clone(),
            collab.store.clone(),
            collab.transport.clone(),
            codec,
            collab.source.clone(),
        );
        Ok(Self {
            full_backload_remaining: config.full_backload_iterations,
            config,
            feed,
            scanner,
            upload,
            store: collab.store,
            source: collab.source,
            decider: collab.decider,
            last_report: None,
        })
    }

    /// Construct a worker from the builder's module configs.
    pub fn from_builder(
        builder: &Arc<Builder>,
        feed: FeedSpec,
        collab: FeedCollaborators,
    ) -> CastResult<Self> {
        let (config, scanner_config, upload_config) =
            worker_configs(&builder.config)?;
        Self::new(
            config,
            scanner_config,
            upload_config,
            builder.codec.clone(),
            feed,
            collab,
        )
    }

    /// The feed this worker serves.
    pub fn feed(&self) -> &FeedSpec {
        &self.feed
    }

    /// The report of the last completed iteration.
    pub fn last_report(&self) -> Option<&IterationReport> {
        self.last_report.as_ref()
    }

    /// The number of days the next iteration scans, today included.
    /// Consumes one full backload iteration if any are left.
    pub fn next_scan_window(&mut self) -> u32 {
        if self.full_backload_remaining > 0 {
            self.full_backload_remaining -= 1;
            self.config.max_backfill_days.saturating_add(1)
        } else {
            self.config.steady_state_days
        }
    }

    /// Run a single iteration with `today` as the newest day.
    pub async fn run_iteration(
        &mut self,
        today: Day,
        cancel: &watch::Receiver<bool>,
    ) -> CastResult<IterationReport> {
        let window = self.next_scan_window();
        let mut report = IterationReport {
            today,
            days: Vec::new(),
            upload: None,
            cancelled: false,
        };

        for back in 0..window {
            if *cancel.borrow() {
                tracing::debug!("cancelled between days");
                report.cancelled = true;
                break;
            }

            let day = today.days_before(back);
            let scan = self.scanner.scan_day(day, back == 0).await?;
            let offline = scan.end == ScanEnd::NoConnection;
            report.days.push(scan);
            if offline {
                break;
            }

            if back == 0 {
                let upload = self.upload_cycle(today).await?;
                let offline = matches!(
                    upload,
                    UploadSummary::Failed {
                        failure: UploadFailure::NoConnection,
                        ..
                    }
                );
                report.upload = Some(upload);
                if offline {
                    break;
                }
            }
        }

        self.last_report = Some(report.clone());
        Ok(report)
    }

    async fn upload_cycle(&self, today: Day) -> CastResult<UploadSummary> {
        let feed_id = self.feed.feed_id;
        let mut retried = false;
        loop {
            match self.upload.upload(today).await? {
                UploadReport::NothingToSend => {
                    return Ok(UploadSummary::NothingToSend)
                }
                UploadReport::Published { index, items } => {
                    let count = items.len();
                    self.source.acknowledge_sent(feed_id, items).await?;
                    return Ok(UploadSummary::Published {
                        index,
                        items: count,
                    });
                }
                UploadReport::Failed { failure, items } => {
                    let decision =
                        self.decider.decide(&self.feed, &failure, &items).await;
                    tracing::debug!(?failure, ?decision, "upload decision");
                    match decision {
                        // at most one immediate retry per iteration
                        FailureDecision::RetryNow if !retried => {
                            retried = true;
                            continue;
                        }
                        FailureDecision::RetryNow
                        | FailureDecision::RetryNextIteration => (),
                        FailureDecision::RetryNextStartup => {
                            self.source
                                .defer_until_restart(feed_id, items)
                                .await?;
                        }
                        FailureDecision::Discard => {
                            self.source.discard(feed_id, items).await?;
                        }
                    }
                    return Ok(UploadSummary::Failed { failure, decision });
                }
            }
        }
    }

    /// Run the loop until cancelled or until too many iterations failed in
    /// a row.
    pub async fn run(
        mut self,
        mut cancel: watch::Receiver<bool>,
    ) -> WorkerExit {
        match self.store.cleanup(self.config.retention_days).await {
            Ok(removed) => tracing::debug!(removed, "startup slot cleanup"),
            Err(err) => tracing::warn!(?err, "startup slot cleanup failed"),
        }

        let mut failures = 0;
        loop {
            if *cancel.borrow() {
                break;
            }

            match self.run_iteration(Day::today(), &cancel).await {
                Ok(report) => {
                    failures = 0;
                    tracing::info!(
                        days = report.days_scanned(),
                        received = report.received(),
                        upload = ?report.upload,
                        "feed iteration complete"
                    );
                }
                Err(err) => {
                    failures += 1;
                    if failures > self.config.max_consecutive_failures {
                        tracing::error!(
                            ?err,
                            failures,
                            "too many failed iterations, feed worker stopping"
                        );
                        return WorkerExit::Fatal {
                            failures,
                            last_error: err,
                        };
                    }
                    tracing::warn!(?err, failures, "feed iteration failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval()) => (),
                res = cancel.changed() => {
                    if res.is_err() {
                        // the supervisor is gone
                        break;
                    }
                }
            }
        }

        tracing::info!("feed worker stopped");
        WorkerExit::Stopped
    }
}

#[derive(Debug)]
struct WorkerHandle {
    feed: FeedSpec,
    cancel: watch::Sender<bool>,
    task: tokio::task::JoinHandle<WorkerExit>,
}

/// Owns one [FeedWorker] task per feed.
#[derive(Debug)]
pub struct FeedSupervisor {
    builder: Arc<Builder>,
    collab: FeedCollaborators,
    workers: Mutex<HashMap<FeedId, WorkerHandle>>,
}

impl Drop for FeedSupervisor {
    fn drop(&mut self) {
        for (_, handle) in self.workers.lock().unwrap().drain() {
            handle.task.abort();
        }
    }
}

impl FeedSupervisor {
    /// Construct a supervisor sharing `collab` between its workers.
    pub fn new(builder: Arc<Builder>, collab: FeedCollaborators) -> Self {
        Self {
            builder,
            collab,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Construct a supervisor, creating the store and transport through
    /// the builder's factories.
    pub async fn from_builder(
        builder: Arc<Builder>,
        source: DynContentSource,
        sink: DynContentSink,
        decider: DynUploadFailureDecider,
    ) -> CastResult<Self> {
        let collab =
            FeedCollaborators::from_builder(&builder, source, sink, decider)
                .await?;
        Ok(Self::new(builder, collab))
    }

    /// Spawn a worker for `feed`. Must be called within a tokio runtime.
    pub fn start(&self, feed: FeedSpec) -> CastResult<()> {
        let feed_id = feed.feed_id;
        let mut workers = self.workers.lock().unwrap();
        if workers
            .get(&feed_id)
            .is_some_and(|h| !h.task.is_finished())
        {
            return Err(CastError::other(format!(
                "feed {feed_id} is already running"
            )));
        }

        let worker = FeedWorker::from_builder(
            &self.builder,
            feed.clone(),
            self.collab.clone(),
        )?;
        let (cancel, cancel_recv) = watch::channel(false);
        let span = tracing::info_span!("feed", feed = %feed_id);
        let task = tokio::spawn(worker.run(cancel_recv).instrument(span));
        tracing::info!(feed = %feed_id, "started feed worker");

        workers.insert(feed_id, WorkerHandle { feed, cancel, task });
        Ok(())
    }

    /// True if a worker for `feed_id` is running.
    pub fn is_running(&self, feed_id: FeedId) -> bool {
        self.workers
            .lock()
            .unwrap()
            .get(&feed_id)
            .is_some_and(|h| !h.task.is_finished())
    }

    /// Cancel the worker for `feed_id` and wait for it to wind down.
    /// Returns how it ended, or None if there was no worker.
    pub async fn stop(&self, feed_id: FeedId) -> Option<WorkerExit> {
        let handle = self.workers.lock().unwrap().remove(&feed_id)?;
        let _ = handle.cancel.send(true);
        match handle.task.await {
            Ok(exit) => Some(exit),
            Err(err) => {
                tracing::warn!(feed = %feed_id, ?err, "feed worker panicked");
                None
            }
        }
    }

    /// Stop the worker for `feed_id` and start a fresh one for the same
    /// feed. The fresh worker begins with a full backload again.
    pub async fn restart(&self, feed_id: FeedId) -> CastResult<()> {
        let feed = self
            .workers
            .lock()
            .unwrap()
            .get(&feed_id)
            .map(|h| h.feed.clone())
            .ok_or_else(|| {
                CastError::other(format!("feed {feed_id} is not supervised"))
            })?;
        self.stop(feed_id).await;
        self.start(feed)
    }

    /// Stop every worker, winding them down concurrently.
    pub async fn stop_all(&self) {
        let ids: Vec<FeedId> =
            self.workers.lock().unwrap().keys().copied().collect();
        futures::future::join_all(ids.into_iter().map(|id| self.stop(id)))
            .await;
    }
}
