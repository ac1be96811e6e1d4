//! The network access port.
//!
//! The DHT is treated as a black-box async key/value store: structured
//! replication, routing and retries live behind [`DhtPort`]. Sagas only see
//! `get`/`put`/`remove` futures that either complete or fail with a
//! [`DhtError`]; a timeout is a failure like any other and triggers rollback.

mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub use memory::{DhtOpCounts, MemoryDht};

/// Size of a DHT key in bytes (blake3 output)
pub const KEY_SIZE: usize = 32;

/// A DHT key.
///
/// Either a content address (hash of the stored block, used for chunks and
/// meta files) or a logical location (derived from a stable identifier, used
/// for user profiles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// Content address: blake3 hash of the stored bytes.
    pub fn content(bytes: &[u8]) -> Self {
        Key(*blake3::hash(bytes).as_bytes())
    }

    /// Logical profile location for a user id.
    pub fn profile(user_id: &str) -> Self {
        Key(blake3::derive_key(
            "peerbox profile location v1",
            user_id.as_bytes(),
        ))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let mut buff = [0u8; KEY_SIZE];
        if bytes.len() != KEY_SIZE {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        buff.copy_from_slice(&bytes);
        Ok(Key(buff))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // short form for logs
        write!(f, "{}", &self.to_hex()[..8])
    }
}

/// Failures surfaced by the network access port.
///
/// Retries, if any, are the port implementation's business; by the time one
/// of these reaches a saga step it is final for that call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DhtError {
    #[error("no value stored under key")]
    NotFound,
    #[error("operation timed out")]
    Timeout,
    #[error("no route to responsible peer")]
    Unreachable,
    #[error("conflicting concurrent write")]
    Conflict,
}

/// Async put/get/remove against the DHT.
///
/// All implementations must be callable from many sagas concurrently; the
/// engine never serializes access across saga instances.
#[async_trait]
pub trait DhtPort: Send + Sync {
    /// Fetch the block stored under `key`.
    async fn get(&self, key: &Key) -> Result<Bytes, DhtError>;

    /// Store `value` under `key`, replacing any previous block.
    async fn put(&self, key: Key, value: Bytes) -> Result<(), DhtError>;

    /// Remove the block stored under `key`. Removing an absent key is an
    /// `Ok` no-op; the DHT gives no stronger guarantee anyway.
    async fn remove(&self, key: &Key) -> Result<(), DhtError>;
}
