//! HTTP API module.
//!
//! Exposes the file lifecycle over a small REST interface: multipart upload,
//! listing, deletion and streamed download.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
