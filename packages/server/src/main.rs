use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::storage::{BlobStore, FilesystemBlobStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use meshdepot_server::build_router;
use meshdepot_server::config::{AppConfig, DatabaseBackend};
use meshdepot_server::database::init_db;
use meshdepot_server::repository::{AssetRepository, MemoryAssetRepository, SeaOrmAssetRepository};
use meshdepot_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let store = FilesystemBlobStore::new(
        config.storage.blob_dir.clone(),
        config.storage.max_blob_size,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to initialize blob storage at {}",
            config.storage.blob_dir.display()
        )
    })?;
    info!(path = %store.root().display(), "Blob storage ready");
    let blobs: Arc<dyn BlobStore> = Arc::new(store);

    let repo: Arc<dyn AssetRepository> = match config.database.backend {
        DatabaseBackend::Postgres => {
            let db = init_db(&config.database.url)
                .await
                .context("Failed to connect to the database")?;
            info!("Database schema synced");
            Arc::new(SeaOrmAssetRepository::new(db))
        }
        DatabaseBackend::Memory => {
            warn!("Using the in-memory repository; records are lost on restart");
            Arc::new(MemoryAssetRepository::new())
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host / server.port")?;

    let app = build_router(AppState::new(config, repo, blobs));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running at http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
