//! Test tools for building bulletins.

use slotcast_api::*;

/// A file-list entry for `sha`.
pub fn file_entry(sha: &str) -> BulletinEntry {
    BulletinEntry::File(SharedFile {
        sha: sha.into(),
        name: format!("{sha}.bin"),
        size: 1024,
        key: None,
    })
}

/// A file-request entry for `sha`.
pub fn request_entry(sha: &str) -> BulletinEntry {
    BulletinEntry::Request { sha: sha.into() }
}

/// A bulletin published now.
pub fn bulletin(
    publisher: Option<&str>,
    entries: Vec<BulletinEntry>,
) -> Bulletin {
    Bulletin {
        published_at: Timestamp::now(),
        publisher: publisher.map(Into::into),
        entries,
    }
}
