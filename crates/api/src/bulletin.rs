//! Bulletin types.

use crate::*;
use std::sync::Arc;

/// A file advertised in a file-list bulletin.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFile {
    /// The content hash of the file.
    pub sha: String,

    /// The file name as the publisher shares it.
    pub name: String,

    /// The file size in bytes.
    pub size: u64,

    /// The network key the file can be downloaded from, once inserted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A single entry of a bulletin.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BulletinEntry {
    /// A shared file descriptor, carried by file-list bulletins.
    File(SharedFile),

    /// A bare content hash, carried by file-request bulletins.
    Request {
        /// The requested content hash.
        sha: String,
    },
}

impl BulletinEntry {
    /// The content hash this entry refers to.
    pub fn sha(&self) -> &str {
        match self {
            Self::File(f) => &f.sha,
            Self::Request { sha } => sha,
        }
    }

    /// Does this entry belong in a bulletin of `kind`.
    pub fn fits(&self, kind: FeedKind) -> bool {
        matches!(
            (self, kind),
            (Self::File(_), FeedKind::FileList)
                | (Self::Request { .. }, FeedKind::FileRequests)
        )
    }
}

/// A batch of entries published at one slot.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bulletin {
    /// When the bulletin was built.
    pub published_at: Timestamp,

    /// The identity that published the bulletin, if the feed carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// The entries.
    pub entries: Vec<BulletinEntry>,
}

/// Turns bulletins into network payloads and back.
pub trait BulletinCodec: 'static + Send + Sync + std::fmt::Debug {
    /// Encode a bulletin.
    fn encode(&self, bulletin: &Bulletin) -> CastResult<bytes::Bytes>;

    /// Decode a bulletin.
    fn decode(&self, data: &[u8]) -> CastResult<Bulletin>;
}

/// Trait-object [BulletinCodec].
pub type DynBulletinCodec = Arc<dyn BulletinCodec>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn entries_fit_only_their_feed_kind() {
        let file = BulletinEntry::File(SharedFile {
            sha: "aa".into(),
            name: "a.txt".into(),
            size: 3,
            key: None,
        });
        let req = BulletinEntry::Request { sha: "bb".into() };

        assert!(file.fits(FeedKind::FileList));
        assert!(!file.fits(FeedKind::FileRequests));
        assert!(req.fits(FeedKind::FileRequests));
        assert!(!req.fits(FeedKind::FileList));
        assert_eq!("aa", file.sha());
        assert_eq!("bb", req.sha());
    }
}
