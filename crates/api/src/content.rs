//! The host side of the protocol: where upload content comes from, where
//! downloaded bulletins go, and who decides about failed uploads.

use crate::*;
use std::sync::Arc;

/// An item waiting to be published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingItem {
    /// Host assigned id, used to acknowledge the item.
    pub id: u64,

    /// The entry to publish.
    pub entry: BulletinEntry,

    /// When the item became pending.
    pub enqueued_at: Timestamp,
}

/// Supplies the content of uploads.
pub trait ContentSource: 'static + Send + Sync + std::fmt::Debug {
    /// Select up to `max_count` items pending for `feed`, skipping items
    /// enqueued before `not_older_than` if given.
    fn select_pending_items(
        &self,
        feed: FeedId,
        max_count: usize,
        not_older_than: Option<Timestamp>,
    ) -> BoxFut<'_, CastResult<Vec<PendingItem>>>;

    /// The items were durably published, stop offering them.
    fn acknowledge_sent(
        &self,
        feed: FeedId,
        items: Vec<PendingItem>,
    ) -> BoxFut<'_, CastResult<()>>;

    /// Keep the items but do not offer them again until the next process
    /// start.
    fn defer_until_restart(
        &self,
        feed: FeedId,
        items: Vec<PendingItem>,
    ) -> BoxFut<'_, CastResult<()>>;

    /// Drop the items permanently.
    fn discard(
        &self,
        feed: FeedId,
        items: Vec<PendingItem>,
    ) -> BoxFut<'_, CastResult<()>>;
}

/// Trait-object [ContentSource].
pub type DynContentSource = Arc<dyn ContentSource>;

/// Receives downloaded bulletins and merges them into host state.
pub trait ContentSink: 'static + Send + Sync + std::fmt::Debug {
    /// Apply a bulletin received on a feed of `kind`.
    ///
    /// Returns false if the bulletin could not be reconciled. The slot it
    /// came from is marked used regardless, so it will not be delivered
    /// again.
    fn apply(&self, kind: FeedKind, bulletin: Bulletin) -> BoxFut<'_, bool>;
}

/// Trait-object [ContentSink].
pub type DynContentSink = Arc<dyn ContentSink>;

/// Why an upload cycle gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadFailure {
    /// The transport reported no connection.
    NoConnection,

    /// The try budget ran out.
    TriesExhausted {
        /// The last slot index attempted.
        last_index: u32,
    },

    /// Every upload slot of the day is used.
    DayFull,
}

/// What to do with the pending items of a failed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDecision {
    /// Run the upload cycle again right away.
    RetryNow,

    /// Keep the items pending, the next scheduled iteration retries.
    RetryNextIteration,

    /// Keep the items, but only offer them again after a restart.
    RetryNextStartup,

    /// Drop the items permanently.
    Discard,
}

/// Decides the fate of content whose upload failed.
///
/// Interactive hosts can ask their user. Automatic hosts use a decider
/// that always answers [FailureDecision::RetryNextIteration].
pub trait UploadFailureDecider: 'static + Send + Sync + std::fmt::Debug {
    /// Decide what happens to `items`.
    fn decide(
        &self,
        feed: &FeedSpec,
        failure: &UploadFailure,
        items: &[PendingItem],
    ) -> BoxFut<'_, FailureDecision>;
}

/// Trait-object [UploadFailureDecider].
pub type DynUploadFailureDecider = Arc<dyn UploadFailureDecider>;
