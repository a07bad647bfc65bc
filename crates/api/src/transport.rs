//! Slotcast transport related types.

use crate::*;
use std::sync::Arc;

/// A put/get interface to a content-addressed, eventually consistent
/// network.
///
/// Implementations own their timeouts and internal retries. The drivers in
/// slotcast_core add an outer retry layer bounding the total commitment per
/// slot and per day.
#[cfg_attr(any(test, feature = "mockall"), mockall::automock)]
pub trait Transport: 'static + Send + Sync + std::fmt::Debug {
    /// Insert `content` under `name`.
    fn put(
        &self,
        name: String,
        content: bytes::Bytes,
    ) -> BoxFut<'_, UploadOutcome>;

    /// Fetch the content stored under `name`.
    ///
    /// Content larger than `max_size` bytes yields
    /// [DownloadOutcome::TooBig]. `max_retries` bounds the transport's own
    /// retrying before it reports a failure.
    fn get(
        &self,
        name: String,
        max_size: u64,
        max_retries: u32,
    ) -> BoxFut<'_, DownloadOutcome>;
}

/// Trait-object [Transport].
pub type DynTransport = Arc<dyn Transport>;

/// A factory for creating transport instances.
pub trait TransportFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &Config) -> CastResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &Config) -> CastResult<()>;

    /// Construct a transport instance.
    fn create(
        &self,
        builder: Arc<Builder>,
    ) -> BoxFut<'static, CastResult<DynTransport>>;
}

/// Trait-object [TransportFactory].
pub type DynTransportFactory = Arc<dyn TransportFactory>;
