//! HTTP server for the file host.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::file::FileService;
use crate::{FilehostError, Result};

use super::handlers::AppState;
use super::router::{create_health_router, create_router};

/// HTTP server for the API.
pub struct WebServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
    max_upload_bytes: usize,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &ServerConfig, files: Arc<FileService>) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| {
                FilehostError::Config(format!(
                    "invalid server address {}:{}: {e}",
                    config.host, config.port
                ))
            })?;

        Ok(Self {
            addr,
            app_state: Arc::new(AppState::new(files)),
            max_upload_bytes: config.max_upload_bytes(),
        })
    }

    /// Get the configured server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build the full router (API plus health check).
    pub fn router(&self) -> Router {
        create_router(self.app_state.clone(), self.max_upload_bytes).merge(create_health_router())
    }

    /// Run the server until `shutdown` completes.
    ///
    /// In-flight requests are allowed to finish before this returns.
    pub async fn run<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!(
            "Web server listening on http://{} (blob backend: {})",
            local_addr,
            self.app_state.files.blob_backend()
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
