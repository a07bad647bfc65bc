//! The default bulletin codec.

use slotcast_api::*;
use std::sync::Arc;

/// Encodes bulletins as JSON documents.
#[derive(Debug, Default)]
pub struct JsonBulletinCodec;

impl JsonBulletinCodec {
    /// Construct a new JsonBulletinCodec.
    pub fn create() -> DynBulletinCodec {
        let out: DynBulletinCodec = Arc::new(JsonBulletinCodec);
        out
    }
}

impl BulletinCodec for JsonBulletinCodec {
    fn encode(&self, bulletin: &Bulletin) -> CastResult<bytes::Bytes> {
        serde_json::to_vec(bulletin)
            .map(bytes::Bytes::from)
            .map_err(|e| CastError::other_src("encode bulletin", e))
    }

    fn decode(&self, data: &[u8]) -> CastResult<Bulletin> {
        serde_json::from_slice(data)
            .map_err(|e| CastError::other_src("decode bulletin", e))
    }
}
