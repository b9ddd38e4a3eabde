//! Persistent plugin storage over sled.
//!
//! Every plugin owns one tree in the shared plugin database, fronted by a
//! versioned metadata header. Inside the tree, named sub-buckets hold the
//! plugin's actual state; a sub-bucket exists only once created, and
//! opening a missing one is a corrupt-store condition.
//!
//! Key encoding is protocol. Never inline key construction in business
//! logic:
//!
//! - `[0xff]`                          → plugin metadata (header + version)
//! - `[0x00, name...]`                 → sub-bucket existence marker
//! - `[0x01, name_len, name..., key]`  → sub-bucket entry
//!
//! Writes run through [`PluginStorage::update`], one sled transaction per
//! consensus change, so a failing hook rolls the whole change back and a
//! hook reads its own writes. The write path is strictly serial per the
//! consensus engine; read views may run concurrently with each other and
//! observe the last committed state.

use std::sync::Arc;

use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree, UnabortableTransactionError,
};
use sled::Tree;

use lib_types::{Decoder, Encoder};

use crate::errors::PluginError;
use crate::plugin::PluginMetadata;

const KEY_METADATA: [u8; 1] = [0xff];
const NS_MARKER: u8 = 0x00;
const NS_ENTRY: u8 = 0x01;

fn marker_key(bucket: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + bucket.len());
    key.push(NS_MARKER);
    key.extend_from_slice(bucket.as_bytes());
    key
}

fn entry_key(bucket: &str, key: &[u8]) -> Vec<u8> {
    debug_assert!(bucket.len() <= u8::MAX as usize);
    let mut out = Vec::with_capacity(2 + bucket.len() + key.len());
    out.push(NS_ENTRY);
    out.push(bucket.len() as u8);
    out.extend_from_slice(bucket.as_bytes());
    out.extend_from_slice(key);
    out
}

fn tx_err(err: UnabortableTransactionError) -> PluginError {
    // Conflicts cannot occur on the serial write path; surface one as a
    // storage failure rather than silently retrying a non-serial caller.
    PluginError::Storage(err.to_string())
}

/// Raw read access to a plugin tree, transactional or committed.
pub trait BucketRead {
    fn raw_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, PluginError>;
}

/// Raw write access to a plugin tree, only ever inside a transaction or
/// during single-threaded registration.
pub trait BucketWrite: BucketRead {
    fn raw_put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), PluginError>;
    fn raw_delete(&self, key: Vec<u8>) -> Result<(), PluginError>;
}

enum ReadInner<'a> {
    Committed(&'a Tree),
    Tx(&'a TransactionalTree),
}

/// Read-only view of a plugin tree.
pub struct BucketRef<'a> {
    inner: ReadInner<'a>,
}

impl<'a> BucketRef<'a> {
    pub fn committed(tree: &'a Tree) -> Self {
        Self { inner: ReadInner::Committed(tree) }
    }

    pub fn transactional(tree: &'a TransactionalTree) -> Self {
        Self { inner: ReadInner::Tx(tree) }
    }
}

impl BucketRead for BucketRef<'_> {
    fn raw_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, PluginError> {
        match self.inner {
            ReadInner::Committed(tree) => tree
                .get(key)
                .map(|v| v.map(|iv| iv.to_vec()))
                .map_err(|e| PluginError::Storage(e.to_string())),
            ReadInner::Tx(tree) => {
                tree.get(key).map(|v| v.map(|iv| iv.to_vec())).map_err(tx_err)
            }
        }
    }
}

enum WriteInner<'a> {
    Plain(&'a Tree),
    Tx(&'a TransactionalTree),
}

/// Writable handle over a plugin tree.
pub struct BucketMut<'a> {
    inner: WriteInner<'a>,
}

impl<'a> BucketMut<'a> {
    /// Direct tree access for single-threaded registration. Hooks never
    /// receive this form; they run inside [`PluginStorage::update`].
    pub fn plain(tree: &'a Tree) -> Self {
        Self { inner: WriteInner::Plain(tree) }
    }

    pub fn transactional(tree: &'a TransactionalTree) -> Self {
        Self { inner: WriteInner::Tx(tree) }
    }

    pub fn as_read(&self) -> BucketRef<'_> {
        match self.inner {
            WriteInner::Plain(tree) => BucketRef::committed(tree),
            WriteInner::Tx(tree) => BucketRef::transactional(tree),
        }
    }
}

impl BucketRead for BucketMut<'_> {
    fn raw_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, PluginError> {
        match self.inner {
            WriteInner::Plain(tree) => tree
                .get(key)
                .map(|v| v.map(|iv| iv.to_vec()))
                .map_err(|e| PluginError::Storage(e.to_string())),
            WriteInner::Tx(tree) => {
                tree.get(key).map(|v| v.map(|iv| iv.to_vec())).map_err(tx_err)
            }
        }
    }
}

impl BucketWrite for BucketMut<'_> {
    fn raw_put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), PluginError> {
        match self.inner {
            WriteInner::Plain(tree) => tree
                .insert(key, value)
                .map(drop)
                .map_err(|e| PluginError::Storage(e.to_string())),
            WriteInner::Tx(tree) => tree.insert(key, value).map(drop).map_err(tx_err),
        }
    }

    fn raw_delete(&self, key: Vec<u8>) -> Result<(), PluginError> {
        match self.inner {
            WriteInner::Plain(tree) => tree
                .remove(key)
                .map(drop)
                .map_err(|e| PluginError::Storage(e.to_string())),
            WriteInner::Tx(tree) => tree.remove(key).map(drop).map_err(tx_err),
        }
    }
}

/// Read-only projection of one named sub-bucket.
pub struct SubBucket<'a> {
    parent: &'a dyn BucketRead,
    name: &'static str,
}

impl SubBucket<'_> {
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, PluginError> {
        self.parent.raw_get(&entry_key(self.name, key))
    }
}

/// Writable projection of one named sub-bucket.
pub struct SubBucketMut<'a> {
    parent: &'a dyn BucketWrite,
    name: &'static str,
}

impl SubBucketMut<'_> {
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, PluginError> {
        self.parent.raw_get(&entry_key(self.name, key))
    }

    pub fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), PluginError> {
        self.parent.raw_put(entry_key(self.name, key), value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), PluginError> {
        self.parent.raw_delete(entry_key(self.name, key))
    }
}

/// Creates the sub-bucket marker if it does not exist yet. Idempotent.
pub fn create_sub_bucket(parent: &dyn BucketWrite, name: &'static str) -> Result<(), PluginError> {
    let marker = marker_key(name);
    if parent.raw_get(&marker)?.is_none() {
        parent.raw_put(marker, Vec::new())?;
    }
    Ok(())
}

/// Opens an existing sub-bucket read-only; a missing marker is a
/// corrupt-store condition.
pub fn open_sub_bucket<'a>(
    parent: &'a dyn BucketRead,
    name: &'static str,
) -> Result<SubBucket<'a>, PluginError> {
    if parent.raw_get(&marker_key(name))?.is_none() {
        return Err(PluginError::CorruptStore(format!("missing bucket {name}")));
    }
    Ok(SubBucket { parent, name })
}

/// Opens an existing sub-bucket for writing; a missing marker is a
/// corrupt-store condition.
pub fn open_sub_bucket_mut<'a>(
    parent: &'a dyn BucketWrite,
    name: &'static str,
) -> Result<SubBucketMut<'a>, PluginError> {
    if parent.raw_get(&marker_key(name))?.is_none() {
        return Err(PluginError::CorruptStore(format!("missing bucket {name}")));
    }
    Ok(SubBucketMut { parent, name })
}

/// Read-view capability handed to plugins at registration, so their read
/// APIs can run against committed state while the write path is elsewhere.
pub trait PluginView: Send + Sync {
    fn view_raw(
        &self,
        f: &mut dyn FnMut(&BucketRef<'_>) -> Result<(), PluginError>,
    ) -> Result<(), PluginError>;
}

/// One plugin's persistent tree plus its metadata header.
pub struct PluginStorage {
    tree: Tree,
    plugin_name: String,
}

impl PluginStorage {
    /// Opens (or creates) the tree for `plugin_name` in the shared plugin
    /// database.
    pub fn open(db: &sled::Db, plugin_name: &str) -> Result<Arc<Self>, PluginError> {
        let tree = db
            .open_tree(plugin_name.as_bytes())
            .map_err(|e| PluginError::Storage(e.to_string()))?;
        Ok(Arc::new(Self { tree, plugin_name: plugin_name.to_string() }))
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    pub fn metadata(&self) -> Result<Option<PluginMetadata>, PluginError> {
        let raw = self
            .tree
            .get(KEY_METADATA)
            .map_err(|e| PluginError::Storage(e.to_string()))?;
        match raw {
            None => Ok(None),
            Some(bytes) => {
                let mut dec = Decoder::new(&bytes);
                let meta = PluginMetadata::decode(&mut dec)?;
                dec.finish()?;
                Ok(Some(meta))
            }
        }
    }

    fn set_metadata(&self, metadata: &PluginMetadata) -> Result<(), PluginError> {
        let mut enc = Encoder::new();
        metadata.encode(&mut enc);
        self.tree
            .insert(KEY_METADATA, enc.finish())
            .map(drop)
            .map_err(|e| PluginError::Storage(e.to_string()))
    }

    /// Registers a plugin against this storage: reads the stored metadata,
    /// runs the plugin's `init` hook, and persists the metadata it returns.
    /// A metadata mismatch inside `init` is fatal and leaves the store
    /// untouched.
    pub fn register(
        self: &Arc<Self>,
        plugin: &mut dyn crate::plugin::ConsensusPlugin,
    ) -> Result<(), PluginError> {
        let existing = self.metadata()?;
        let bucket = BucketMut::plain(&self.tree);
        let metadata = plugin.init(existing, &bucket, self.clone() as Arc<dyn PluginView>)?;
        self.set_metadata(&metadata)?;
        self.tree
            .flush()
            .map_err(|e| PluginError::Storage(e.to_string()))?;
        tracing::info!(
            plugin = %self.plugin_name,
            header = %metadata.header,
            version = %metadata.version,
            "plugin registered"
        );
        Ok(())
    }

    /// Runs `f` inside one atomic write transaction. The closure may run
    /// more than once if the storage layer retries; it must be
    /// deterministic over the bucket state.
    pub fn update<T, F>(&self, f: F) -> Result<T, PluginError>
    where
        F: Fn(&BucketMut<'_>) -> Result<T, PluginError>,
    {
        let result = self.tree.transaction(|tx| {
            let bucket = BucketMut::transactional(tx);
            f(&bucket).map_err(ConflictableTransactionError::Abort)
        });
        match result {
            Ok(value) => Ok(value),
            Err(TransactionError::Abort(err)) => Err(err),
            Err(TransactionError::Storage(err)) => Err(PluginError::Storage(err.to_string())),
        }
    }

    /// Runs `f` against the committed state.
    pub fn view<T, F>(&self, f: F) -> Result<T, PluginError>
    where
        F: FnOnce(&BucketRef<'_>) -> Result<T, PluginError>,
    {
        f(&BucketRef::committed(&self.tree))
    }

    /// Full tree contents, for revert-equivalence checks in tests and
    /// diagnostics. Metadata is excluded.
    pub fn snapshot(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, PluginError> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (k, v) = item.map_err(|e| PluginError::Storage(e.to_string()))?;
            if k.as_ref() == &KEY_METADATA[..] {
                continue;
            }
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }
}

impl PluginView for PluginStorage {
    fn view_raw(
        &self,
        f: &mut dyn FnMut(&BucketRef<'_>) -> Result<(), PluginError>,
    ) -> Result<(), PluginError> {
        f(&BucketRef::committed(&self.tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> (tempfile::TempDir, Arc<PluginStorage>) {
        let dir = tempfile::tempdir().unwrap();
        let db = sled::open(dir.path()).unwrap();
        let storage = PluginStorage::open(&db, "testPlugin").unwrap();
        (dir, storage)
    }

    #[test]
    fn sub_bucket_lifecycle() {
        let (_dir, storage) = temp_storage();

        // opening before creation is a corrupt-store condition
        let err = storage
            .view(|bucket| open_sub_bucket(bucket, "records").map(drop))
            .unwrap_err();
        assert!(matches!(err, PluginError::CorruptStore(_)));

        storage
            .update(|bucket| {
                create_sub_bucket(bucket, "records")?;
                let records = open_sub_bucket_mut(bucket, "records")?;
                records.put(b"k", b"v".to_vec())?;
                // read-your-writes inside the transaction
                assert_eq!(records.get(b"k")?, Some(b"v".to_vec()));
                Ok(())
            })
            .unwrap();

        let value = storage
            .view(|bucket| open_sub_bucket(bucket, "records")?.get(b"k"))
            .unwrap();
        assert_eq!(value, Some(b"v".to_vec()));
    }

    #[test]
    fn failed_update_rolls_back() {
        let (_dir, storage) = temp_storage();
        storage
            .update(|bucket| create_sub_bucket(bucket, "records"))
            .unwrap();

        let before = storage.snapshot().unwrap();
        let err = storage.update(|bucket| {
            let records = open_sub_bucket_mut(bucket, "records")?;
            records.put(b"k", b"v".to_vec())?;
            Err::<(), _>(PluginError::Storage("induced failure".into()))
        });
        assert!(err.is_err());
        assert_eq!(storage.snapshot().unwrap(), before);
    }

    #[test]
    fn metadata_round_trip() {
        let (_dir, storage) = temp_storage();
        assert!(storage.metadata().unwrap().is_none());
        let meta = PluginMetadata::new("testPlugin", "1.0.0.0");
        storage.set_metadata(&meta).unwrap();
        assert_eq!(storage.metadata().unwrap(), Some(meta));
    }

    #[test]
    fn sub_buckets_do_not_collide() {
        let (_dir, storage) = temp_storage();
        storage
            .update(|bucket| {
                create_sub_bucket(bucket, "a")?;
                create_sub_bucket(bucket, "ab")?;
                open_sub_bucket_mut(bucket, "a")?.put(b"bk", b"1".to_vec())?;
                open_sub_bucket_mut(bucket, "ab")?.put(b"k", b"2".to_vec())?;
                Ok(())
            })
            .unwrap();
        let (a, ab) = storage
            .view(|bucket| {
                Ok((
                    open_sub_bucket(bucket, "a")?.get(b"bk")?,
                    open_sub_bucket(bucket, "ab")?.get(b"k")?,
                ))
            })
            .unwrap();
        assert_eq!(a, Some(b"1".to_vec()));
        assert_eq!(ab, Some(b"2".to_vec()));
    }
}
