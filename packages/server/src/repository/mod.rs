//! Persistence seam for model assets.
//!
//! Services only talk to [`AssetRepository`]; the sea-orm implementation backs
//! production and the in-memory one backs tests and local demos.

mod memory;
mod relational;

pub use memory::MemoryAssetRepository;
pub use relational::SeaOrmAssetRepository;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::asset::{
    AssetFilter, AssetPatch, ConversionArtifact, Counter, DefaultView, ModelAsset, NewAsset,
};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),

    /// A stored row could not be turned back into a domain value.
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },
}

/// Result of a uniqueness-enforcing artifact append.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Appended(ConversionArtifact),
    /// Another writer already stored an artifact for this format.
    Existing(ConversionArtifact),
    MissingAsset,
}

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn insert(&self, asset: NewAsset) -> Result<ModelAsset, RepositoryError>;

    async fn find(&self, id: Uuid) -> Result<Option<ModelAsset>, RepositoryError>;

    /// Matching assets, newest first.
    async fn list(&self, filter: &AssetFilter) -> Result<Vec<ModelAsset>, RepositoryError>;

    async fn update_metadata(
        &self,
        id: Uuid,
        patch: &AssetPatch,
    ) -> Result<Option<ModelAsset>, RepositoryError>;

    /// Returns the updated record, or `None` when the asset does not exist.
    async fn set_thumbnail(
        &self,
        id: Uuid,
        thumbnail: Option<String>,
    ) -> Result<Option<ModelAsset>, RepositoryError>;

    async fn set_default_view(
        &self,
        id: Uuid,
        view: &DefaultView,
    ) -> Result<bool, RepositoryError>;

    /// Atomically add one to a counter and return the new value.
    async fn increment(&self, id: Uuid, counter: Counter) -> Result<Option<u64>, RepositoryError>;

    async fn append_artifact(
        &self,
        id: Uuid,
        artifact: ConversionArtifact,
    ) -> Result<AppendOutcome, RepositoryError>;

    /// Remove the asset and its artifact rows. Returns `false` if absent.
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}
