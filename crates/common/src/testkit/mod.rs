/// Lightweight harness for saga integration tests
///
/// Seeds an in-memory DHT with a user profile and file content the same way
/// completed sagas would have left them, without requiring the engine. Tests
/// then run real sagas against the seeded state.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::TestEnv;
///
/// #[tokio::test]
/// async fn test_delete() -> anyhow::Result<()> {
///     let env = TestEnv::new("alice").await?;
///     env.seed_folder("/docs").await?;
///     let file = env.seed_file("/docs/a.txt", &[b"h1", b"h2"]).await?;
///     // ... run a saga against env.dht ...
///     Ok(())
/// }
/// ```
use std::path::{Path, PathBuf};

use bytes::Bytes;
use uuid::Uuid;

use crate::block::BlockEncoded;
use crate::crypto::{Secret, UserCredentials};
use crate::dht::{DhtPort, Key, MemoryDht};
use crate::model::{ChunkRef, FileTreeNode, MetaFile, UserProfile};

/// Handles to a file seeded into the test DHT.
#[derive(Debug, Clone)]
pub struct SeededFile {
    pub node_id: Uuid,
    pub meta_key: Key,
    pub chunk_keys: Vec<Key>,
}

/// One user's view of an in-memory test network.
pub struct TestEnv {
    pub dht: MemoryDht,
    pub credentials: UserCredentials,
    pub secret: Secret,
}

impl TestEnv {
    /// Create a user with an empty committed profile.
    pub async fn new(user_id: &str) -> anyhow::Result<Self> {
        let credentials = UserCredentials::new(user_id, "password", "1234");
        let secret = credentials.derive_secret()?;
        let env = TestEnv {
            dht: MemoryDht::new(),
            credentials,
            secret,
        };
        env.commit_profile(&UserProfile::new(user_id)).await?;
        Ok(env)
    }

    pub fn profile_key(&self) -> Key {
        Key::profile(self.credentials.user_id())
    }

    /// Fetch and decrypt the committed profile.
    pub async fn load_profile(&self) -> anyhow::Result<UserProfile> {
        let block = self.dht.get(&self.profile_key()).await?;
        let plain = self.secret.decrypt(&block)?;
        Ok(UserProfile::decode(&plain)?)
    }

    /// Encrypt and commit a profile, replacing the stored one.
    pub async fn commit_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        let block = self.secret.encrypt(&profile.encode()?)?;
        self.dht
            .put(self.profile_key(), Bytes::from(block))
            .await?;
        Ok(())
    }

    /// Create (and commit) a folder at `path`, creating missing ancestors.
    pub async fn seed_folder(&self, path: impl AsRef<Path>) -> anyhow::Result<Uuid> {
        let mut profile = self.load_profile().await?;
        let id = self.mkdir_all(&mut profile, path.as_ref())?;
        self.commit_profile(&profile).await?;
        Ok(id)
    }

    fn mkdir_all(&self, profile: &mut UserProfile, path: &Path) -> anyhow::Result<Uuid> {
        let mut current = profile.tree().root_id();
        let mut walked = PathBuf::from("/");
        for component in path.iter() {
            let component = component.to_string_lossy().to_string();
            if component == "/" {
                continue;
            }
            walked.push(&component);
            current = match profile.tree().resolve(&walked) {
                Some(node) => node.id(),
                None => profile
                    .tree_mut()
                    .attach(current, FileTreeNode::new_folder(component))?,
            };
        }
        Ok(current)
    }

    /// Seed a one-version file whose chunks hold the given plaintexts, then
    /// commit the updated profile. Returns the DHT handles a delete saga
    /// needs to be checked against.
    pub async fn seed_file(
        &self,
        path: impl AsRef<Path>,
        chunks: &[&[u8]],
    ) -> anyhow::Result<SeededFile> {
        let path = path.as_ref();
        let mut profile = self.load_profile().await?;

        let mut refs = Vec::with_capacity(chunks.len());
        let mut chunk_keys = Vec::with_capacity(chunks.len());
        for plain in chunks {
            let block = self.secret.encrypt(plain)?;
            let key = Key::content(&block);
            self.dht.put(key, Bytes::from(block)).await?;
            refs.push(ChunkRef::new(key, plain.len() as u64));
            chunk_keys.push(key);
        }

        let meta = MetaFile::initial(refs);
        let meta_block = self.secret.encrypt(&meta.encode()?)?;
        let meta_key = Key::content(&meta_block);
        self.dht.put(meta_key, Bytes::from(meta_block)).await?;

        let parent = match path.parent() {
            Some(parent) if parent != Path::new("/") => self.mkdir_all(&mut profile, parent)?,
            _ => profile.tree().root_id(),
        };
        let name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("path has no file name: {:?}", path))?
            .to_string_lossy()
            .to_string();
        let node_id = profile
            .tree_mut()
            .attach(parent, FileTreeNode::new_file(name, meta_key))?;

        self.commit_profile(&profile).await?;

        Ok(SeededFile {
            node_id,
            meta_key,
            chunk_keys,
        })
    }
}
