//! The per (feed, day) slot bookkeeping record.

use crate::*;

/// How many slots a feed has per day unless configured otherwise.
/// Valid indices are `0..DEFAULT_SLOT_CAPACITY`.
pub const DEFAULT_SLOT_CAPACITY: u32 = 1000;

/// A fixed size bit-set. Bits are only ever set, never cleared.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawSlotBits")]
struct SlotBits {
    len: u32,
    words: Vec<u64>,
}

/// Unchecked wire form of [SlotBits].
#[derive(serde::Deserialize)]
struct RawSlotBits {
    len: u32,
    words: Vec<u64>,
}

impl TryFrom<RawSlotBits> for SlotBits {
    type Error = String;

    fn try_from(raw: RawSlotBits) -> Result<Self, Self::Error> {
        let expected = (raw.len as usize).div_ceil(64);
        if raw.words.len() != expected {
            return Err(format!(
                "slot bits of len {} need {} words, got {}",
                raw.len,
                expected,
                raw.words.len()
            ));
        }
        Ok(Self {
            len: raw.len,
            words: raw.words,
        })
    }
}

impl SlotBits {
    fn new(len: u32) -> Self {
        Self {
            len,
            words: vec![0; (len as usize).div_ceil(64)],
        }
    }

    fn get(&self, index: u32) -> bool {
        index < self.len
            && self.words[(index / 64) as usize] & (1u64 << (index % 64)) != 0
    }

    /// Returns true if the bit was not set before.
    fn set(&mut self, index: u32) -> bool {
        if self.get(index) {
            return false;
        }
        self.words[(index / 64) as usize] |= 1u64 << (index % 64);
        true
    }

    fn first_unset_from(&self, from: u32) -> Option<u32> {
        let mut index = from;
        while index < self.len {
            let word = (index / 64) as usize;
            let unset = !self.words[word] >> (index % 64);
            if unset != 0 {
                let found = index + unset.trailing_zeros();
                return (found < self.len).then_some(found);
            }
            index = (word as u32 + 1) * 64;
        }
        None
    }

    fn union(&mut self, other: &SlotBits) -> bool {
        let mut changed = false;
        for (mine, theirs) in self.words.iter_mut().zip(other.words.iter()) {
            let merged = *mine | *theirs;
            changed |= merged != *mine;
            *mine = merged;
        }
        changed
    }
}

/// Tracks which slots of one feed on one calendar day have been used for
/// upload and which have been tried for download.
///
/// Both bit-sets are append-only: a slot is never reused for the same
/// feed and day. A freshly constructed slot is transient until a
/// [SlotStore] persists it. Every mutation raises a dirty flag that the
/// store consumes via [IndexSlot::mark_persisted].
///
/// The `find_*` methods return `None` once every slot has been used,
/// which callers treat as "day fully scanned" or "day full".
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSlot {
    feed: FeedId,
    day: Day,
    upload_used: SlotBits,
    download_tried: SlotBits,
    last_content_index: Option<u32>,
    #[serde(skip)]
    dirty: bool,
    #[serde(skip)]
    persisted: bool,
}

impl IndexSlot {
    /// A transient, all-unused slot record with the default capacity.
    pub fn new(feed: FeedId, day: Day) -> Self {
        Self::with_capacity(feed, day, DEFAULT_SLOT_CAPACITY)
    }

    /// A transient, all-unused slot record with `capacity` slots.
    pub fn with_capacity(feed: FeedId, day: Day, capacity: u32) -> Self {
        Self {
            feed,
            day,
            upload_used: SlotBits::new(capacity),
            download_tried: SlotBits::new(capacity),
            last_content_index: None,
            dirty: false,
            persisted: false,
        }
    }

    /// The feed this record belongs to.
    pub fn feed(&self) -> FeedId {
        self.feed
    }

    /// The day this record belongs to.
    pub fn day(&self) -> Day {
        self.day
    }

    /// The number of slots in this record.
    pub fn capacity(&self) -> u32 {
        self.upload_used.len
    }

    /// The lowest slot not yet used for upload.
    pub fn find_first_upload_slot(&self) -> Option<u32> {
        self.upload_used.first_unset_from(0)
    }

    /// The lowest slot above `index` not yet used for upload.
    pub fn find_next_upload_slot(&self, index: u32) -> Option<u32> {
        self.upload_used.first_unset_from(index.saturating_add(1))
    }

    /// The lowest slot not yet tried for download.
    pub fn find_first_download_slot(&self) -> Option<u32> {
        self.download_tried.first_unset_from(0)
    }

    /// The lowest slot above `index` not yet tried for download.
    pub fn find_next_download_slot(&self, index: u32) -> Option<u32> {
        self.download_tried.first_unset_from(index.saturating_add(1))
    }

    /// Record that we inserted content at `index`.
    ///
    /// Our own content counts as content known to exist at that slot.
    pub fn set_upload_slot_used(&mut self, index: u32) {
        if self.check_range(index) {
            self.dirty |= self.upload_used.set(index);
            self.mark_content_seen(index);
        }
    }

    /// Record that a download attempt at `index` reached a definitive
    /// outcome and must never be retried.
    pub fn set_download_slot_used(&mut self, index: u32) {
        if self.check_range(index) {
            self.dirty |= self.download_tried.set(index);
        }
    }

    /// Record that `index` is known to hold real content, raising the
    /// high-water mark used by [Self::is_download_index_behind_last_set_index].
    pub fn mark_content_seen(&mut self, index: u32) {
        if !self.check_range(index) {
            return;
        }
        if self.last_content_index.map_or(true, |last| index > last) {
            self.last_content_index = Some(index);
            self.dirty = true;
        }
    }

    /// Has `index` been used for upload.
    pub fn is_upload_slot_used(&self, index: u32) -> bool {
        self.upload_used.get(index)
    }

    /// Has `index` been tried for download.
    pub fn is_download_slot_used(&self, index: u32) -> bool {
        self.download_tried.get(index)
    }

    /// The highest index this feed and day is known to have held content.
    pub fn last_content_index(&self) -> Option<u32> {
        self.last_content_index
    }

    /// True if `index` is less than or equal to the highest index known
    /// to have held content.
    ///
    /// An empty slot at such an index is a gap inside the known backlog.
    /// An empty slot past it may simply not be published yet.
    pub fn is_download_index_behind_last_set_index(&self, index: u32) -> bool {
        self.last_content_index.is_some_and(|last| index <= last)
    }

    /// Has this record been mutated since it was last persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Has this record ever been persisted by a store.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Called by a [SlotStore] after the record has been written.
    pub fn mark_persisted(&mut self) {
        self.dirty = false;
        self.persisted = true;
    }

    /// Union the bits of `other` into this record.
    ///
    /// Returns true if anything changed. Records of a different feed or
    /// day, or with a different capacity, are rejected.
    pub fn merge(&mut self, other: &IndexSlot) -> CastResult<bool> {
        if self.feed != other.feed
            || self.day != other.day
            || self.capacity() != other.capacity()
        {
            return Err(CastError::other(format!(
                "cannot merge slot {}/{} into {}/{}",
                other.feed, other.day, self.feed, self.day,
            )));
        }
        let mut changed = self.upload_used.union(&other.upload_used);
        changed |= self.download_tried.union(&other.download_tried);
        if let Some(index) = other.last_content_index {
            let before = self.last_content_index;
            self.mark_content_seen(index);
            changed |= before != self.last_content_index;
        }
        self.dirty |= changed;
        Ok(changed)
    }

    fn check_range(&self, index: u32) -> bool {
        if index >= self.capacity() {
            tracing::warn!(
                feed = %self.feed,
                day = %self.day,
                index,
                "slot index out of range, ignoring"
            );
            return false;
        }
        true
    }
}
