use std::sync::Arc;
use std::time::Duration;

use common::storage::BlobStore;

use crate::config::AppConfig;
use crate::repository::AssetRepository;
use crate::services::{AssetLifecycleManager, ConversionEngine, ConversionPolicy, UploadPolicy};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub assets: Arc<AssetLifecycleManager>,
    pub conversions: Arc<ConversionEngine>,
}

impl AppState {
    /// Wire the services over a repository and blob store.
    pub fn new(
        config: AppConfig,
        repo: Arc<dyn AssetRepository>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let assets = Arc::new(AssetLifecycleManager::new(
            repo,
            blobs.clone(),
            UploadPolicy::new(config.storage.max_upload_size),
        ));
        let conversions = Arc::new(ConversionEngine::new(
            assets.clone(),
            blobs,
            ConversionPolicy {
                allow_obj_to_stl: config.conversion.allow_obj_to_stl,
            },
        ));

        Self {
            config: Arc::new(config),
            assets,
            conversions,
        }
    }

    pub fn public_prefix(&self) -> &str {
        &self.config.storage.public_prefix
    }

    pub fn conversion_timeout(&self) -> Duration {
        Duration::from_secs(self.config.conversion.timeout_secs)
    }
}
