//! The core stub transport implementation provided by slotcast.

use bytes::Bytes;
use slotcast_api::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};


/// The core stub transport implementation provided by slotcast.
/// This is NOT a production module. It is for testing only.
/// All transports created by one factory share a single in-process
/// [MemNetwork].
#[derive(Debug)]
pub struct MemTransportFactory {
    network: MemNetwork,
}

impl MemTransportFactory {
    /// Construct a new MemTransportFactory on a fresh network.
    pub fn create() -> DynTransportFactory {
        Self::with_network(MemNetwork::default())
    }

    /// Construct a new MemTransportFactory on an existing network, so
    /// several peers can exchange content.
    pub fn with_network(network: MemNetwork) -> DynTransportFactory {
        let out: DynTransportFactory =
            Arc::new(MemTransportFactory { network });
        out
    }
}

impl TransportFactory for MemTransportFactory {
    fn default_config(&self, _config: &Config) -> CastResult<()> {
        Ok(())
    }

    fn validate_config(&self, _config: &Config) -> CastResult<()> {
        Ok(())
    }

    fn create(
        &self,
        _builder: Arc<Builder>,
    ) -> BoxFut<'static, CastResult<DynTransport>> {
        let network = self.network.clone();
        Box::pin(async move {
            let out: DynTransport = Arc::new(MemTransport { network });
            Ok(out)
        })
    }
}

#[derive(Debug, Default)]
struct NetworkInner {
    data: HashMap<String, Bytes>,
    offline: bool,
    puts: u64,
    gets: u64,
}

/// An in-process stand-in for the content network.
///
/// Names are write-once: inserting different content under an occupied
/// name is a key collision, inserting the same content again succeeds.
#[derive(Debug, Clone, Default)]
pub struct MemNetwork(Arc<Mutex<NetworkInner>>);

impl MemNetwork {
    /// Construct a new, empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Place content directly, as if another node had inserted it.
    pub fn insert(&self, name: impl Into<String>, content: Bytes) {
        self.0.lock().unwrap().data.insert(name.into(), content);
    }

    /// Drop content, as if the network had forgotten it.
    pub fn evict(&self, name: &str) -> Option<Bytes> {
        self.0.lock().unwrap().data.remove(name)
    }

    /// Look up content without counting a request.
    pub fn peek(&self, name: &str) -> Option<Bytes> {
        self.0.lock().unwrap().data.get(name).cloned()
    }

    /// All names currently holding content, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut out: Vec<String> =
            self.0.lock().unwrap().data.keys().cloned().collect();
        out.sort();
        out
    }

    /// While offline, every request reports no connection.
    pub fn set_offline(&self, offline: bool) {
        self.0.lock().unwrap().offline = offline;
    }

    /// The number of put requests seen so far.
    pub fn put_count(&self) -> u64 {
        self.0.lock().unwrap().puts
    }

    /// The number of get requests seen so far.
    pub fn get_count(&self) -> u64 {
        self.0.lock().unwrap().gets
    }
}

#[derive(Debug)]
struct MemTransport {
    network: MemNetwork,
}

impl Transport for MemTransport {
    fn put(&self, name: String, content: Bytes) -> BoxFut<'_, UploadOutcome> {
        Box::pin(async move {
            let mut lock = self.network.0.lock().unwrap();
            lock.puts += 1;
            if lock.offline {
                return UploadOutcome::NoConnection;
            }
            match lock.data.get(&name).cloned() {
                Some(existing) if existing == content => UploadOutcome::Success,
                Some(_) => UploadOutcome::KeyCollision,
                None => {
                    lock.data.insert(name, content);
                    UploadOutcome::Success
                }
            }
        })
    }

    fn get(
        &self,
        name: String,
        max_size: u64,
        _max_retries: u32,
    ) -> BoxFut<'_, DownloadOutcome> {
        Box::pin(async move {
            let mut lock = self.network.0.lock().unwrap();
            lock.gets += 1;
            if lock.offline {
                return DownloadOutcome::NoConnection;
            }
            match lock.data.get(&name) {
                None => DownloadOutcome::NotFound,
                Some(content) if content.len() as u64 > max_size => {
                    DownloadOutcome::TooBig
                }
                Some(content) => DownloadOutcome::Success(content.clone()),
            }
        })
    }
}
