//! An in-memory outbox of pending bulletin entries.

use slotcast_api::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Outbox {
    next_id: u64,
    pending: HashMap<FeedId, Vec<PendingItem>>,
    deferred: HashMap<FeedId, Vec<PendingItem>>,
}

fn take_ids(
    list: &mut Vec<PendingItem>,
    items: &[PendingItem],
) -> Vec<PendingItem> {
    let mut taken = Vec::new();
    list.retain(|i| {
        if items.iter().any(|o| o.id == i.id) {
            taken.push(i.clone());
            false
        } else {
            true
        }
    });
    taken
}

/// A [ContentSource] holding pending entries in memory.
///
/// Items deferred until restart are parked until [MemContentSource::restart]
/// is called.
#[derive(Debug, Default)]
pub struct MemContentSource(Mutex<Outbox>);

impl MemContentSource {
    /// Construct a new, empty source.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue an entry for publication on `feed`. Returns the item id.
    pub fn enqueue(&self, feed: FeedId, entry: BulletinEntry) -> u64 {
        self.enqueue_at(feed, entry, Timestamp::now())
    }

    /// Queue an entry with an explicit enqueue time.
    pub fn enqueue_at(
        &self,
        feed: FeedId,
        entry: BulletinEntry,
        enqueued_at: Timestamp,
    ) -> u64 {
        let mut lock = self.0.lock().unwrap();
        lock.next_id += 1;
        let id = lock.next_id;
        lock.pending.entry(feed).or_default().push(PendingItem {
            id,
            entry,
            enqueued_at,
        });
        id
    }

    /// Items still waiting to be sent on `feed`, oldest first.
    pub fn pending(&self, feed: FeedId) -> Vec<PendingItem> {
        self.0
            .lock()
            .unwrap()
            .pending
            .get(&feed)
            .cloned()
            .unwrap_or_default()
    }

    /// Items parked until the next restart.
    pub fn deferred(&self, feed: FeedId) -> Vec<PendingItem> {
        self.0
            .lock()
            .unwrap()
            .deferred
            .get(&feed)
            .cloned()
            .unwrap_or_default()
    }

    /// Simulate a process restart: parked items become pending again.
    pub fn restart(&self) {
        let mut lock = self.0.lock().unwrap();
        let deferred = std::mem::take(&mut lock.deferred);
        for (feed, mut items) in deferred {
            let pending = lock.pending.entry(feed).or_default();
            pending.append(&mut items);
            pending.sort_by_key(|i| i.id);
        }
    }
}

impl ContentSource for MemContentSource {
    fn select_pending_items(
        &self,
        feed: FeedId,
        max_count: usize,
        not_older_than: Option<Timestamp>,
    ) -> BoxFut<'_, CastResult<Vec<PendingItem>>> {
        Box::pin(async move {
            let lock = self.0.lock().unwrap();
            Ok(lock
                .pending
                .get(&feed)
                .map(|list| {
                    list.iter()
                        .filter(|i| {
                            not_older_than.map_or(true, |t| i.enqueued_at >= t)
                        })
                        .take(max_count)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    fn acknowledge_sent(
        &self,
        feed: FeedId,
        items: Vec<PendingItem>,
    ) -> BoxFut<'_, CastResult<()>> {
        Box::pin(async move {
            let mut lock = self.0.lock().unwrap();
            if let Some(list) = lock.pending.get_mut(&feed) {
                take_ids(list, &items);
            }
            Ok(())
        })
    }

    fn defer_until_restart(
        &self,
        feed: FeedId,
        items: Vec<PendingItem>,
    ) -> BoxFut<'_, CastResult<()>> {
        Box::pin(async move {
            let mut lock = self.0.lock().unwrap();
            let taken = match lock.pending.get_mut(&feed) {
                Some(list) => take_ids(list, &items),
                None => return Ok(()),
            };
            lock.deferred.entry(feed).or_default().extend(taken);
            Ok(())
        })
    }

    fn discard(
        &self,
        feed: FeedId,
        items: Vec<PendingItem>,
    ) -> BoxFut<'_, CastResult<()>> {
        Box::pin(async move {
            let mut lock = self.0.lock().unwrap();
            if let Some(list) = lock.pending.get_mut(&feed) {
                let dropped = take_ids(list, &items);
                tracing::debug!(
                    %feed,
                    count = dropped.len(),
                    "discarded items"
                );
            }
            Ok(())
        })
    }
}
