//! The default [ContentSink]: merges received bulletins into host state.
//!
//! File-list bulletins teach us who shares what. Each publisher identity
//! is tracked with the time of its newest bulletin, and a bulletin that is
//! not newer than one already applied is skipped. Every advertised file is
//! recorded with the set of identities offering it. If an advertised key
//! differs from the key an active download is using, the download is
//! flagged for a restart.
//!
//! File-request bulletins name content hashes other nodes want. For files
//! we share, the time of the newest request is recorded so the host can
//! re-insert popular content.

use slotcast_api::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};


/// Bulletins claiming to be published further than this into the future
/// are rejected.
pub const MAX_CLOCK_SKEW: std::time::Duration =
    std::time::Duration::from_secs(60 * 60 * 24);

/// What we know about a file advertised by other nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownFile {
    /// The advertised name.
    pub name: String,

    /// The advertised size.
    pub size: u64,

    /// The newest advertised network key, if any.
    pub key: Option<String>,

    /// The identities that advertised this file.
    pub sources: BTreeSet<String>,

    /// The publish time of the newest bulletin mentioning this file.
    pub last_seen: Timestamp,
}

#[derive(Debug, Clone, Copy)]
struct Identity {
    newest_bulletin: Timestamp,
}

#[derive(Debug, Clone)]
struct Download {
    key: Option<String>,
    restart: bool,
}

#[derive(Debug, Default)]
struct State {
    identities: HashMap<String, Identity>,
    files: HashMap<String, KnownFile>,
    shared: HashMap<String, Option<Timestamp>>,
    downloads: HashMap<String, Download>,
}

/// Merges received bulletins into in-memory host state.
#[derive(Debug, Default)]
pub struct CoreReconciler(Mutex<State>);

impl CoreReconciler {
    /// Construct a new, empty reconciler.
    pub fn create() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a file we share, so requests for it are tracked.
    pub fn share_file(&self, sha: impl Into<String>) {
        self.0.lock().unwrap().shared.entry(sha.into()).or_insert(None);
    }

    /// Register an active download fetching `sha` from `key`.
    pub fn start_download(
        &self,
        sha: impl Into<String>,
        key: Option<String>,
    ) {
        self.0.lock().unwrap().downloads.insert(
            sha.into(),
            Download {
                key,
                restart: false,
            },
        );
    }

    /// The publish time of the newest bulletin applied from `publisher`.
    pub fn identity_last_seen(&self, publisher: &str) -> Option<Timestamp> {
        self.0
            .lock()
            .unwrap()
            .identities
            .get(publisher)
            .map(|i| i.newest_bulletin)
    }

    /// What we know about the file `sha`.
    pub fn known_file(&self, sha: &str) -> Option<KnownFile> {
        self.0.lock().unwrap().files.get(sha).cloned()
    }

    /// When a request for the shared file `sha` was last received.
    pub fn request_last_received(&self, sha: &str) -> Option<Timestamp> {
        self.0.lock().unwrap().shared.get(sha).copied().flatten()
    }

    /// Take the downloads whose key changed, with their new key.
    /// Each restart is reported once.
    pub fn take_restart_requests(&self) -> Vec<(String, Option<String>)> {
        let mut lock = self.0.lock().unwrap();
        let mut out: Vec<(String, Option<String>)> = lock
            .downloads
            .iter_mut()
            .filter(|(_, d)| d.restart)
            .map(|(sha, d)| {
                d.restart = false;
                (sha.clone(), d.key.clone())
            })
            .collect();
        out.sort();
        out
    }
}

impl State {
    fn apply_file_list(&mut self, bulletin: Bulletin) -> bool {
        let Some(publisher) = bulletin.publisher else {
            tracing::warn!("file list bulletin without publisher");
            return false;
        };
        let published_at = bulletin.published_at;

        if let Some(known) = self.identities.get(&publisher) {
            if known.newest_bulletin >= published_at {
                tracing::debug!(%publisher, "skipping stale file list");
                return true;
            }
        }
        self.identities.insert(
            publisher.clone(),
            Identity {
                newest_bulletin: published_at,
            },
        );

        for entry in bulletin.entries {
            let BulletinEntry::File(file) = entry else {
                continue;
            };
            let known = self.files.entry(file.sha.clone()).or_insert_with(|| {
                KnownFile {
                    name: file.name.clone(),
                    size: file.size,
                    key: None,
                    sources: BTreeSet::new(),
                    last_seen: published_at,
                }
            });
            known.name = file.name;
            known.size = file.size;
            known.last_seen = known.last_seen.max(published_at);
            known.sources.insert(publisher.clone());
            if file.key.is_some() {
                known.key.clone_from(&file.key);
            }

            if let (Some(dl), Some(key)) =
                (self.downloads.get_mut(&file.sha), file.key)
            {
                if dl.key.as_deref() != Some(key.as_str()) {
                    tracing::info!(sha = %file.sha, "download key changed");
                    dl.key = Some(key);
                    dl.restart = true;
                }
            }
        }
        true
    }

    fn apply_requests(&mut self, bulletin: Bulletin) -> bool {
        for entry in bulletin.entries {
            let BulletinEntry::Request { sha } = entry else {
                continue;
            };
            if let Some(last) = self.shared.get_mut(&sha) {
                if last.map_or(true, |t| t < bulletin.published_at) {
                    tracing::debug!(%sha, "file requested");
                    *last = Some(bulletin.published_at);
                }
            }
        }
        true
    }
}

impl ContentSink for CoreReconciler {
    fn apply(&self, kind: FeedKind, bulletin: Bulletin) -> BoxFut<'_, bool> {
        Box::pin(async move {
            if bulletin.published_at > Timestamp::now() + MAX_CLOCK_SKEW {
                tracing::warn!(
                    published_at = ?bulletin.published_at,
                    "bulletin published in the future"
                );
                return false;
            }
            if let Some(entry) = bulletin.entries.iter().find(|e| !e.fits(kind))
            {
                tracing::warn!(?kind, sha = entry.sha(), "entry of wrong kind");
                return false;
            }

            let mut lock = self.0.lock().unwrap();
            match kind {
                FeedKind::FileList => lock.apply_file_list(bulletin),
                FeedKind::FileRequests => lock.apply_requests(bulletin),
            }
        })
    }
}
