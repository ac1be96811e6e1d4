/**
 * Block encoding for DHT payloads.
 *  Everything that lives in the DHT as a structured
 *  object (profiles, meta files) goes through here.
 */
pub mod block;
/**
 * Cryptographic types and operations.
 *  - Symmetric content encryption
 *  - Credential-derived profile keys
 */
pub mod crypto;
/**
 * The network access port: an async get/put/remove
 *  view over the DHT, plus an in-memory implementation
 *  used by tests and single-node setups.
 */
pub mod dht;
/**
 * The distributed file-mutation data model:
 *  user profiles, file trees, meta files and
 *  chunk references.
 */
pub mod model;
/**
 * Lightweight harness for saga integration tests.
 */
pub mod testkit;

pub mod prelude {
    pub use crate::block::{BlockEncoded, CodecError};
    pub use crate::crypto::{Secret, SecretError, UserCredentials};
    pub use crate::dht::{DhtError, DhtPort, Key, MemoryDht};
    pub use crate::model::{
        ChunkRef, FileTree, FileTreeNode, FileVersion, MetaFile, ModelError, UserProfile,
    };
}
