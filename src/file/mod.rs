//! File lifecycle module.
//!
//! This module provides:
//! - File identifiers and metadata records
//! - Expiry options and password hashing
//! - Blob storage backends (local disk, remote object store, in-memory)
//! - The SQLite file registry
//! - The lifecycle service and the background expiry sweep

mod id;
mod password;
mod record;
mod registry;
mod service;
mod storage;
mod sweep;

pub use id::FileId;
pub use password::PasswordHasher;
pub use record::{ExpiryOption, FileRecord};
pub use registry::{FileRegistry, SqliteFileRegistry};
pub use service::{
    Download, FileService, SweepReport, UploadRequest, DEFAULT_CONTENT_TYPE,
    DEFAULT_OPERATION_TIMEOUT,
};
pub use storage::{BlobReader, BlobStore, LocalBlobStore, MemoryBlobStore, RemoteBlobStore};
pub use sweep::{start_expiry_sweeper, ExpirySweeper, SweepHandle, SWEEP_INTERVAL};
