//! API handlers.

use std::sync::Arc;

use crate::file::FileService;

pub mod file;

pub use file::*;

/// Shared application state.
pub struct AppState {
    /// File lifecycle service.
    pub files: Arc<FileService>,
}

impl AppState {
    /// Create a new AppState.
    pub fn new(files: Arc<FileService>) -> Self {
        Self { files }
    }
}
