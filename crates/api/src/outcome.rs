//! Results of single network operations.
//!
//! None of these are errors in the [CastError] sense. The drivers decide
//! per outcome whether a slot is tried, retried, skipped or the whole
//! cycle aborted.

#[cfg(doc)]
use crate::CastError;

/// The result of a single network put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The content was accepted at the requested name.
    Success,

    /// The transport could not route the insert. Retry the same name.
    RouteFailure,

    /// The name is already occupied by different content. Skip to the
    /// next free slot.
    KeyCollision,

    /// There is no connection to the network. Abort this cycle.
    NoConnection,

    /// Any other failure.
    OtherError(String),
}

/// The result of a single network get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The name resolved to this payload.
    Success(bytes::Bytes),

    /// The name currently resolves to nothing ("all data not found").
    NotFound,

    /// The content exceeds the requested maximum size.
    TooBig,

    /// The transport could not route the request, after its own retries.
    RouteFailure,

    /// There is no connection to the network. Abort this cycle.
    NoConnection,

    /// Any other failure.
    OtherError(String),
}

impl DownloadOutcome {
    /// Is this a successful fetch.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
