//! Filehost - a temporary file hosting service.
//!
//! Files are uploaded with an optional password and an expiry option, stored
//! as opaque blobs, and tracked in a SQLite registry. Expired files are
//! removed both when read and by an hourly background sweep.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod web;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::Database;
pub use error::{FilehostError, Result};
pub use file::{
    BlobStore, ExpiryOption, FileId, FileRecord, FileRegistry, FileService, PasswordHasher,
    UploadRequest,
};
