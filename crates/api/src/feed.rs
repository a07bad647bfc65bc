//! Feed identity and slot naming.

use crate::*;

/// Identifies a logical feed.
///
/// Negative values are sentinels for the well-known system feeds,
/// positive values are the primary key of a board or identity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct FeedId(pub i64);

impl FeedId {
    /// The shared file-list feed.
    pub const FILE_LISTS: FeedId = FeedId(-1);

    /// The shared file-request feed.
    pub const FILE_REQUESTS: FeedId = FeedId(-2);

    /// Is this one of the well-known system feeds.
    pub fn is_system(&self) -> bool {
        self.0 < 0
    }
}

impl std::fmt::Display for FeedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The two bulletin protocols that run over slotted feeds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum FeedKind {
    /// Lists of files shared by an identity.
    FileList,

    /// Lists of content hashes a peer wants help locating.
    FileRequests,
}

/// Everything a worker needs to know about the feed it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSpec {
    /// Which protocol this feed carries.
    pub kind: FeedKind,

    /// The slot store key of this feed.
    pub feed_id: FeedId,

    /// The network topic prefix, e.g. `KSK@slotcast/filelist`.
    pub prefix: String,

    /// The feed discriminator placed before the date in slot names.
    pub discriminator: String,

    /// The local identity that signs uploaded bulletins, if any.
    pub publisher: Option<String>,
}

impl FeedSpec {
    /// The well-known file-list feed, publishing as `publisher`.
    pub fn file_lists(publisher: Option<String>) -> Self {
        Self {
            kind: FeedKind::FileList,
            feed_id: FeedId::FILE_LISTS,
            prefix: "KSK@slotcast/filelist".into(),
            discriminator: "fl".into(),
            publisher,
        }
    }

    /// The well-known file-request feed.
    pub fn file_requests() -> Self {
        Self {
            kind: FeedKind::FileRequests,
            feed_id: FeedId::FILE_REQUESTS,
            prefix: "KSK@slotcast/filerequests".into(),
            discriminator: "fr".into(),
            publisher: None,
        }
    }

    /// The network name of `index` on `day` in this feed.
    pub fn slot_name(&self, day: Day, index: u32) -> SlotName {
        SlotName::new(&self.prefix, &self.discriminator, day, index)
    }
}

/// A network name of a single slot.
///
/// Renders as `<prefix>/<discriminator>-<YYYY.M.D>-<index>.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotName(String);

impl SlotName {
    /// Construct a slot name.
    pub fn new(
        prefix: &str,
        discriminator: &str,
        day: Day,
        index: u32,
    ) -> Self {
        Self(format!("{prefix}/{discriminator}-{day}-{index}.xml"))
    }

    /// The name as a str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SlotName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<SlotName> for String {
    fn from(n: SlotName) -> Self {
        n.0
    }
}
