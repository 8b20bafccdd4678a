use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::{AppendOutcome, AssetRepository, RepositoryError};
use crate::models::asset::{
    AssetFilter, AssetPatch, ConversionArtifact, Counter, DefaultView, ModelAsset, NewAsset,
};

/// Process-local asset records.
///
/// Every mutation holds the shard lock of the asset's entry, which is what
/// makes counter increments and artifact appends atomic.
#[derive(Default)]
pub struct MemoryAssetRepository {
    assets: DashMap<Uuid, ModelAsset>,
}

impl MemoryAssetRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetRepository for MemoryAssetRepository {
    async fn insert(&self, asset: NewAsset) -> Result<ModelAsset, RepositoryError> {
        let now = Utc::now();
        let record = ModelAsset {
            id: Uuid::now_v7(),
            name: asset.name,
            description: asset.description,
            original_filename: asset.original_filename,
            file_size: asset.file_size,
            file_type: asset.file_type,
            file_path: asset.file_path,
            thumbnail_path: asset.thumbnail_path,
            converted_formats: Vec::new(),
            uploaded_by: asset.uploaded_by,
            default_view: DefaultView::default(),
            view_count: 0,
            download_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.assets.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find(&self, id: Uuid) -> Result<Option<ModelAsset>, RepositoryError> {
        Ok(self.assets.get(&id).map(|a| a.value().clone()))
    }

    async fn list(&self, filter: &AssetFilter) -> Result<Vec<ModelAsset>, RepositoryError> {
        let mut assets: Vec<ModelAsset> = self
            .assets
            .iter()
            .filter(|a| filter.matches(a.value()))
            .map(|a| a.value().clone())
            .collect();
        assets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(assets)
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        patch: &AssetPatch,
    ) -> Result<Option<ModelAsset>, RepositoryError> {
        let Some(mut asset) = self.assets.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            asset.name = name.clone();
        }
        if let Some(description) = &patch.description {
            asset.description = description.clone();
        }
        asset.updated_at = Utc::now();
        Ok(Some(asset.value().clone()))
    }

    async fn set_thumbnail(
        &self,
        id: Uuid,
        thumbnail: Option<String>,
    ) -> Result<Option<ModelAsset>, RepositoryError> {
        let Some(mut asset) = self.assets.get_mut(&id) else {
            return Ok(None);
        };
        asset.thumbnail_path = thumbnail;
        asset.updated_at = Utc::now();
        Ok(Some(asset.value().clone()))
    }

    async fn set_default_view(
        &self,
        id: Uuid,
        view: &DefaultView,
    ) -> Result<bool, RepositoryError> {
        let Some(mut asset) = self.assets.get_mut(&id) else {
            return Ok(false);
        };
        asset.default_view = *view;
        asset.updated_at = Utc::now();
        Ok(true)
    }

    async fn increment(&self, id: Uuid, counter: Counter) -> Result<Option<u64>, RepositoryError> {
        let Some(mut asset) = self.assets.get_mut(&id) else {
            return Ok(None);
        };
        let value = match counter {
            Counter::Views => &mut asset.view_count,
            Counter::Downloads => &mut asset.download_count,
        };
        *value += 1;
        Ok(Some(*value))
    }

    async fn append_artifact(
        &self,
        id: Uuid,
        artifact: ConversionArtifact,
    ) -> Result<AppendOutcome, RepositoryError> {
        let Entry::Occupied(mut entry) = self.assets.entry(id) else {
            return Ok(AppendOutcome::MissingAsset);
        };
        let asset = entry.get_mut();
        if let Some(existing) = asset.artifact(artifact.format) {
            return Ok(AppendOutcome::Existing(existing.clone()));
        }
        asset.converted_formats.push(artifact.clone());
        asset.updated_at = Utc::now();
        Ok(AppendOutcome::Appended(artifact))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.assets.remove(&id).is_some())
    }
}
