//! A test content sink.

use slotcast_api::*;
use std::sync::{Arc, Mutex};

/// A [ContentSink] that records every bulletin it is handed.
#[derive(Debug)]
pub struct RecordingSink {
    accept: bool,
    received: Mutex<Vec<(FeedKind, Bulletin)>>,
}

impl RecordingSink {
    /// A sink that accepts everything.
    pub fn create() -> Arc<Self> {
        Arc::new(Self {
            accept: true,
            received: Mutex::new(Vec::new()),
        })
    }

    /// A sink that records but reports every bulletin as rejected.
    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            accept: false,
            received: Mutex::new(Vec::new()),
        })
    }

    /// Everything received so far, in arrival order.
    pub fn received(&self) -> Vec<(FeedKind, Bulletin)> {
        self.received.lock().unwrap().clone()
    }

    /// The content hashes of every entry received so far.
    pub fn shas(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, b)| b.entries.iter().map(|e| e.sha().to_string()))
            .collect()
    }
}

impl ContentSink for RecordingSink {
    fn apply(&self, kind: FeedKind, bulletin: Bulletin) -> BoxFut<'_, bool> {
        self.received.lock().unwrap().push((kind, bulletin));
        let accept = self.accept;
        Box::pin(async move { accept })
    }
}
