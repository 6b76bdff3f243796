//! File lifecycle manager.
//!
//! Orchestrates upload, retrieval, listing and deletion across the
//! [`FileRegistry`] and the [`BlobStore`]:
//! - Upload mints an id, hashes the password, writes the blob, then the record,
//!   and deletes the blob again if the record cannot be written
//! - Retrieve enforces expiry (deleting expired files as a side effect) and
//!   the password, then opens the blob
//! - Delete removes the record first and the blob second
//! - [`FileService::purge_expired`] is the sweep body run by
//!   [`ExpirySweeper`](super::ExpirySweeper)
//!
//! # Consistency
//!
//! The two stores are not updated atomically and no per-id lock is held.
//! A Delete racing a Retrieve of the same id may let the Retrieve succeed with
//! bytes whose record disappears right after, or fail with `NotFound` after
//! the metadata read looked fine. Both deletion paths treat "already gone" as
//! done.
//!
//! # Cancellation
//!
//! Every store call runs under the configured operation timeout. Dropping a
//! returned future (for example when the HTTP client disconnects) cancels the
//! store call in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::SubsecRound;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use super::password::PasswordHasher;
use super::registry::FileRegistry;
use super::storage::{BlobReader, BlobStore};
use super::{ExpiryOption, FileId, FileRecord};
use crate::clock::{Clock, SystemClock};
use crate::{FilehostError, Result};

/// Default bound on a single registry or blob store call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Fallback content type when none is declared and none can be guessed.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Request data for a file upload. The bytes travel separately as a stream.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Original filename.
    pub name: String,
    /// Content type declared by the client.
    pub content_type: Option<String>,
    /// Size declared by the client (advisory).
    pub declared_size: Option<u64>,
    /// Duration option as sent by the client (`permanent`, `1h`, `1d`, `7d`, `30d`).
    pub duration: String,
    /// Optional password. Empty means unprotected.
    pub password: Option<String>,
}

impl UploadRequest {
    /// Create a new upload request with the given filename and duration.
    pub fn new(name: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: duration.into(),
            ..Default::default()
        }
    }

    /// Set the declared content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the declared size.
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// A successful retrieval: metadata plus an open blob stream.
pub struct Download {
    /// File metadata, password hash removed.
    pub record: FileRecord,
    /// Blob contents.
    pub reader: BlobReader,
}

impl Download {
    /// Read the whole blob into memory.
    pub async fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.record.size as usize);
        self.reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| FilehostError::BlobStore(format!("read {}: {e}", self.record.id)))?;
        Ok(buf)
    }
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired records found by the scan.
    pub scanned: usize,
    /// Records deleted by this sweep.
    pub deleted: usize,
    /// Records already deleted by someone else.
    pub already_gone: usize,
    /// Records whose deletion failed (retried on the next sweep).
    pub failed: usize,
}

/// File lifecycle manager.
///
/// Cheap to share behind an `Arc`; holds no per-file state.
pub struct FileService {
    registry: Arc<dyn FileRegistry>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    hasher: PasswordHasher,
    operation_timeout: Duration,
}

impl FileService {
    /// Create a new FileService over the given stores.
    pub fn new(registry: Arc<dyn FileRegistry>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            registry,
            blobs,
            clock: Arc::new(SystemClock),
            hasher: PasswordHasher::default(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Use a different time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different password hasher (cost).
    pub fn with_password_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Set the bound applied to each store call.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Get the configured operation timeout.
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Name of the blob backend in use.
    pub fn blob_backend(&self) -> &'static str {
        self.blobs.backend_name()
    }

    async fn blob_op<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.operation_timeout, fut)
            .await
            .map_err(|_| FilehostError::BlobStore(format!("{op} timed out")))?
    }

    async fn registry_op<T>(&self, op: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.operation_timeout, fut)
            .await
            .map_err(|_| FilehostError::Registry(format!("{op} timed out")))?
    }

    async fn hash_password(&self, password: String) -> Result<String> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| FilehostError::Hashing(e.to_string()))?
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| FilehostError::Hashing(e.to_string()))?
    }

    fn resolve_content_type(request: &UploadRequest) -> String {
        match request.content_type.as_deref().map(str::trim) {
            Some(ct) if !ct.is_empty() => ct.to_string(),
            _ => mime_guess::from_path(&request.name)
                .first_raw()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
        }
    }

    /// Upload a file.
    ///
    /// `reader` is consumed to completion exactly once. The blob is written
    /// before the record; if the record cannot be written the blob is deleted
    /// again (best effort) and the registry error is returned. The upload is
    /// never retried.
    ///
    /// The returned record still carries the password hash; it is never
    /// serialized.
    pub async fn upload(&self, request: UploadRequest, reader: BlobReader) -> Result<FileRecord> {
        let id = FileId::generate();
        let upload_time = self.clock.now().trunc_subsecs(6);

        let expiry = match ExpiryOption::parse_strict(&request.duration) {
            Some(expiry) => expiry,
            None => {
                let fallback = ExpiryOption::default();
                warn!(
                    "Unrecognized duration {:?} for upload {}, using {}",
                    request.duration, id, fallback
                );
                fallback
            }
        };

        let password_hash = match request.password.as_deref() {
            Some(p) if !p.is_empty() => Some(self.hash_password(p.to_string()).await?),
            _ => None,
        };

        let content_type = Self::resolve_content_type(&request);

        let size = self
            .blob_op("store blob", self.blobs.store(&id, reader))
            .await?;

        if let Some(declared) = request.declared_size {
            if declared != size {
                debug!(
                    "Upload {} declared {} bytes but stored {}",
                    id, declared, size
                );
            }
        }

        let record = FileRecord {
            id,
            name: request.name,
            size,
            content_type,
            upload_time,
            expiry_time: expiry.expiry_from(upload_time),
            password_hash,
        };

        if let Err(e) = self
            .registry_op("create record", self.registry.create(&record))
            .await
        {
            warn!("Failed to register upload {}: {}; removing blob", id, e);
            match self.blob_op("delete blob", self.blobs.delete(&id)).await {
                Ok(_) => {}
                Err(cleanup) => warn!(
                    "Compensating delete of blob {} failed, blob leaked: {}",
                    id, cleanup
                ),
            }
            return Err(e);
        }

        info!(
            "Uploaded {} ({:?}, {} bytes, expires {})",
            id,
            record.name,
            record.size,
            record
                .expiry_time
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string())
        );

        Ok(record)
    }

    /// Retrieve a file.
    ///
    /// This read has side effects: an expired record is deleted together with
    /// its blob before `Expired` is returned, and a record whose blob is
    /// missing is deleted before `NotFound` is returned. Expiry is never
    /// extended by a read.
    pub async fn retrieve(&self, id: &str, password: &str) -> Result<Download> {
        let id = FileId::parse(id)?;

        let record = self
            .registry_op("get record", self.registry.get(&id))
            .await?
            .ok_or_else(|| FilehostError::NotFound(format!("file {id}")))?;

        if record.is_expired_at(self.clock.now()) {
            info!("File {} expired, deleting on read", id);
            match self.remove(&id).await {
                Ok(()) | Err(FilehostError::NotFound(_)) => {}
                Err(e) => warn!("Failed to delete expired file {}: {}", id, e),
            }
            return Err(FilehostError::Expired(id));
        }

        if let Some(hash) = record.password_hash.as_deref() {
            if password.is_empty() {
                return Err(FilehostError::PasswordRequired);
            }
            if !self.verify_password(password, hash).await? {
                return Err(FilehostError::IncorrectPassword);
            }
        }

        let reader = match self.blob_op("fetch blob", self.blobs.fetch(&id)).await {
            Ok(reader) => reader,
            Err(FilehostError::NotFound(_)) => {
                warn!("Blob for {} is missing, removing orphaned record", id);
                if let Err(e) = self
                    .registry_op("delete record", self.registry.delete(&id))
                    .await
                {
                    warn!("Failed to remove orphaned record {}: {}", id, e);
                }
                return Err(FilehostError::NotFound(format!("file {id}")));
            }
            Err(e) => return Err(e),
        };

        debug!("Serving {} ({} bytes)", id, record.size);

        Ok(Download {
            record: record.without_password_hash(),
            reader,
        })
    }

    /// List all files, password hashes removed.
    pub async fn list(&self) -> Result<Vec<FileRecord>> {
        let records = self
            .registry_op("list records", self.registry.list())
            .await?;
        Ok(records
            .into_iter()
            .map(FileRecord::without_password_hash)
            .collect())
    }

    /// Delete a file by caller-supplied id.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let id = FileId::parse(id)?;
        self.remove(&id).await
    }

    /// Delete a file: record first, then blob.
    ///
    /// Returns `NotFound` if there is no record. A blob delete failure after
    /// the record is gone is logged and otherwise ignored.
    pub async fn remove(&self, id: &FileId) -> Result<()> {
        let existed = self
            .registry_op("delete record", self.registry.delete(id))
            .await?;
        if !existed {
            return Err(FilehostError::NotFound(format!("file {id}")));
        }

        match self.blob_op("delete blob", self.blobs.delete(id)).await {
            Ok(true) => {}
            Ok(false) => debug!("Blob for {} was already gone", id),
            Err(e) => warn!("Record {} deleted but blob delete failed: {}", id, e),
        }

        info!("Deleted {}", id);
        Ok(())
    }

    /// Delete every record whose expiry time is strictly before now.
    ///
    /// Uses the same path as [`FileService::remove`]; records deleted
    /// concurrently by a retrieve are counted as `already_gone`.
    pub async fn purge_expired(&self) -> Result<SweepReport> {
        self.purge_expired_until(|| false).await
    }

    /// Like [`FileService::purge_expired`], but checks `stop` before each
    /// record and returns early once it is true.
    ///
    /// A record whose delete has started is always finished, so a stop never
    /// leaves a blob without its record. Records not reached stay for the
    /// next sweep.
    pub async fn purge_expired_until<F>(&self, stop: F) -> Result<SweepReport>
    where
        F: Fn() -> bool + Send + Sync,
    {
        let now = self.clock.now();
        let expired = self
            .registry_op("scan expired", self.registry.list_expired_before(now))
            .await?;

        let mut report = SweepReport {
            scanned: expired.len(),
            ..Default::default()
        };

        for record in expired {
            if stop() {
                debug!(
                    "Sweep stopped with {} expired files left",
                    report.scanned - report.deleted - report.already_gone - report.failed
                );
                break;
            }
            match self.remove(&record.id).await {
                Ok(()) => report.deleted += 1,
                Err(FilehostError::NotFound(_)) => report.already_gone += 1,
                Err(e) => {
                    warn!("Sweep failed to delete {}: {}", record.id, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
