//! Block encoding for structured DHT payloads.
//!
//! Profiles and meta files are stored in the DHT as opaque byte blocks.
//! This trait pins down the one encoding used for all of them so that
//! content addresses stay stable across peers.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Errors raised while encoding or decoding a DHT block
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("block encode error: {0}")]
    Encode(#[source] bincode::Error),
    #[error("block decode error: {0}")]
    Decode(#[source] bincode::Error),
}

/// Serde-backed binary encoding for objects stored as DHT blocks.
///
/// Blanket behavior only; implementors opt in with an empty `impl`.
pub trait BlockEncoded: Serialize + DeserializeOwned {
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(CodecError::Encode)
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(bytes).map_err(CodecError::Decode)
    }
}
