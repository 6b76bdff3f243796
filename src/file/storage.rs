//! Blob storage for uploaded file contents.
//!
//! Every backend implements the same three operations over [`BlobStore`]:
//! store, fetch and delete, keyed by [`FileId`]. The lifecycle manager only
//! ever talks to the trait.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use super::FileId;
use crate::{FilehostError, Result};

/// A readable byte stream handed into or out of a blob store.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Durable byte storage keyed by file id.
///
/// Calls with disjoint ids may run concurrently. Concurrent calls on the same
/// id have no defined outcome.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Consume `reader` to completion and store it under `id`.
    ///
    /// Returns the number of bytes written.
    async fn store(&self, id: &FileId, reader: BlobReader) -> Result<u64>;

    /// Open the blob stored under `id`.
    ///
    /// Returns `NotFound` if there is no such blob.
    async fn fetch(&self, id: &FileId) -> Result<BlobReader>;

    /// Delete the blob stored under `id`.
    ///
    /// Returns `false` if it did not exist.
    async fn delete(&self, id: &FileId) -> Result<bool>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

fn blob_error(id: &FileId, op: &str, e: io::Error) -> FilehostError {
    FilehostError::BlobStore(format!("{op} {id}: {e}"))
}

/// Local filesystem blob store.
///
/// Blobs are sharded by the first two characters of the id:
/// ```text
/// {base_path}/
/// ├── ab/
/// │   └── ab12cd34-5678-40ab-8def-123456789012
/// └── cd/
///     └── cd90ab12-3456-4890-abcd-ef1234567890
/// ```
/// Writes go to a `.part` file that is renamed into place once complete, so
/// a reader never sees a half-written blob. An unfinished part file is removed
/// when the store is cancelled or fails.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// Create a store rooted at `base_path`, creating the directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;

        Ok(Self { base_path })
    }

    /// Get the base path of this store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Full path of the blob for `id`: `{base_path}/{shard}/{id}`.
    pub fn blob_path(&self, id: &FileId) -> PathBuf {
        let name = id.to_string();
        self.base_path.join(Self::shard(&name)).join(&name)
    }

    fn shard(name: &str) -> &str {
        if name.len() >= 2 {
            &name[..2]
        } else {
            name
        }
    }

    /// Check if a blob exists.
    pub async fn exists(&self, id: &FileId) -> bool {
        fs::try_exists(self.blob_path(id)).await.unwrap_or(false)
    }

    /// Remove leftover `.part` files and empty shard directories.
    ///
    /// Part files only survive a crash mid-write. Call this at startup, before
    /// any store is in progress. Returns how many entries were removed.
    pub async fn remove_leftovers(&self) -> Result<usize> {
        let mut removed = 0;
        let mut shards = fs::read_dir(&self.base_path).await?;

        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let shard_path = shard.path();

            let mut remaining = 0;
            let mut entries = fs::read_dir(&shard_path).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == PART_EXTENSION) {
                    fs::remove_file(&path).await?;
                    debug!("Removed leftover part file {:?}", path);
                    removed += 1;
                } else {
                    remaining += 1;
                }
            }

            if remaining == 0 && fs::remove_dir(&shard_path).await.is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

const PART_EXTENSION: &str = "part";

/// A blob being written. The file is removed on drop unless the write was
/// committed, so a store cancelled by a timeout or a dropped caller leaves
/// nothing behind.
struct PartFile {
    path: PathBuf,
    committed: bool,
}

impl PartFile {
    fn new(blob_path: &Path) -> Self {
        Self {
            path: blob_path.with_extension(PART_EXTENSION),
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed unfinished part file {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove part file {:?}: {}", self.path, e),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, id: &FileId, mut reader: BlobReader) -> Result<u64> {
        let path = self.blob_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| blob_error(id, "create shard for", e))?;
        }

        let part = PartFile::new(&path);
        let written = async {
            let mut file = fs::File::create(&part.path).await?;
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&part.path, &path).await?;
            Ok::<_, io::Error>(written)
        }
        .await;

        match written {
            Ok(written) => {
                part.commit();
                debug!("Stored blob {} ({} bytes)", id, written);
                Ok(written)
            }
            Err(e) => Err(blob_error(id, "store", e)),
        }
    }

    async fn fetch(&self, id: &FileId) -> Result<BlobReader> {
        match fs::File::open(self.blob_path(id)).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(FilehostError::NotFound(format!("blob {id}")))
            }
            Err(e) => Err(blob_error(id, "fetch", e)),
        }
    }

    async fn delete(&self, id: &FileId) -> Result<bool> {
        match fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(blob_error(id, "delete", e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

/// Placeholder for an object-storage backend (S3-compatible bucket).
///
/// Carries its configuration but performs no I/O; every operation fails with
/// a `BlobStore` error so a misconfigured deployment cannot silently accept
/// uploads it never persisted.
#[derive(Debug, Clone)]
pub struct RemoteBlobStore {
    endpoint: String,
    bucket: String,
}

impl RemoteBlobStore {
    /// Create a remote store description.
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
        }
    }

    /// Object key for a file id.
    pub fn object_key(&self, id: &FileId) -> String {
        format!("{}/{}", self.bucket, id)
    }

    fn unsupported(&self, op: &str, id: &FileId) -> FilehostError {
        FilehostError::BlobStore(format!(
            "{op} {} at {}: remote object store is not implemented",
            self.object_key(id),
            self.endpoint
        ))
    }
}

#[async_trait]
impl BlobStore for RemoteBlobStore {
    async fn store(&self, id: &FileId, _reader: BlobReader) -> Result<u64> {
        Err(self.unsupported("store", id))
    }

    async fn fetch(&self, id: &FileId) -> Result<BlobReader> {
        Err(self.unsupported("fetch", id))
    }

    async fn delete(&self, id: &FileId) -> Result<bool> {
        Err(self.unsupported("delete", id))
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }
}

/// In-process blob store, used for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<FileId, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a blob exists for `id`.
    pub fn contains(&self, id: &FileId) -> bool {
        self.blobs
            .read()
            .map(|blobs| blobs.contains_key(id))
            .unwrap_or(false)
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|blobs| blobs.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> FilehostError {
        FilehostError::BlobStore("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, id: &FileId, mut reader: BlobReader) -> Result<u64> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| blob_error(id, "store", e))?;
        let written = buf.len() as u64;

        self.blobs
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(*id, buf);
        Ok(written)
    }

    async fn fetch(&self, id: &FileId) -> Result<BlobReader> {
        let data = self
            .blobs
            .read()
            .map_err(|_| Self::poisoned())?
            .get(id)
            .cloned()
            .ok_or_else(|| FilehostError::NotFound(format!("blob {id}")))?;
        Ok(Box::new(io::Cursor::new(data)))
    }

    async fn delete(&self, id: &FileId) -> Result<bool> {
        Ok(self
            .blobs
            .write()
            .map_err(|_| Self::poisoned())?
            .remove(id)
            .is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
