use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use filehost::config::StorageBackend;
use filehost::file::{
    start_expiry_sweeper, BlobStore, ExpirySweeper, LocalBlobStore, RemoteBlobStore,
    SqliteFileRegistry,
};
use filehost::web::WebServer;
use filehost::{Config, Database, FileService, PasswordHasher};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    // Initialize logging
    if let Err(e) = filehost::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        filehost::logging::init_console_only(&config.logging.level);
    }

    info!("Filehost starting");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> filehost::Result<()> {
    let db = Database::open(&config.database.path).await?;
    let registry = Arc::new(SqliteFileRegistry::new(db.pool().clone()));

    let blobs: Arc<dyn BlobStore> = match config.storage.backend {
        StorageBackend::Local => {
            let store = LocalBlobStore::new(&config.storage.path).await?;
            let removed = store.remove_leftovers().await?;
            if removed > 0 {
                info!(
                    "Removed {} leftover entries from {}",
                    removed,
                    store.base_path().display()
                );
            }
            Arc::new(store)
        }
        StorageBackend::Remote => Arc::new(RemoteBlobStore::new(
            &config.storage.endpoint,
            &config.storage.bucket,
        )),
    };

    let hasher = PasswordHasher::with_params(
        config.files.password_memory_kib,
        config.files.password_iterations,
        config.files.password_parallelism,
    )?;

    let files = Arc::new(
        FileService::new(registry, blobs)
            .with_password_hasher(hasher)
            .with_operation_timeout(config.files.operation_timeout()),
    );

    let sweep = start_expiry_sweeper(ExpirySweeper::new(files.clone()));

    let server = WebServer::new(&config.server, files)?;
    let served = server.run(shutdown_signal()).await;

    info!("Shutting down");
    sweep.shutdown().await;
    db.close().await;

    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
