use std::sync::Arc;

use common::storage::{BlobRef, BlobStore, BoxReader, StorageError, derived_blob_name, unique_blob_name};
use mesh::{Mesh, MeshError, MeshFormat, Normalization, thumbnail};
use tracing::{info, warn};
use uuid::Uuid;

use super::{AssetError, UploadPolicy};
use crate::models::asset::{
    AssetFilter, AssetPatch, ConversionArtifact, Counter, DefaultView, ModelAsset, NewAsset,
};
use crate::models::shared::{normalize_description, normalize_name};
use crate::repository::{AppendOutcome, AssetRepository};
use crate::utils::filename::{client_filename, swap_extension};

/// A model file as received from a client.
#[derive(Debug, Default)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Externally hosted preview that replaces the generated thumbnail.
    pub thumbnail_url: Option<String>,
}

/// A resolved, readable model file.
pub struct ModelFile {
    pub filename: String,
    pub format: MeshFormat,
    pub size: u64,
    pub reader: BoxReader,
}

/// Parsed and normalized geometry of an asset's original file.
#[derive(Debug)]
pub struct ViewerGeometry {
    pub format: MeshFormat,
    pub mesh: Mesh,
    pub normalization: Normalization,
}

/// Owns asset records together with the blobs they reference.
pub struct AssetLifecycleManager {
    repo: Arc<dyn AssetRepository>,
    blobs: Arc<dyn BlobStore>,
    policy: UploadPolicy,
}

fn ensure_owner(asset: &ModelAsset, requester: &str) -> Result<(), AssetError> {
    if asset.is_owned_by(requester) {
        Ok(())
    } else {
        Err(AssetError::Forbidden)
    }
}

fn validate_thumbnail_url(url: &str) -> Result<Option<String>, AssetError> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(None);
    }
    let allowed = url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/');
    if !allowed || url.len() > 2048 || url.chars().any(|c| c.is_control()) {
        return Err(AssetError::InvalidInput(
            "thumbnailUrl must be an absolute http(s) URL or a path starting with '/'".into(),
        ));
    }
    Ok(Some(url.to_string()))
}

impl AssetLifecycleManager {
    pub fn new(
        repo: Arc<dyn AssetRepository>,
        blobs: Arc<dyn BlobStore>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            repo,
            blobs,
            policy,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Full upload path: policy, parse check, original blob, record.
    pub async fn ingest(&self, upload: Upload, uploader: &str) -> Result<ModelAsset, AssetError> {
        let filename = client_filename(&upload.filename)
            .map_err(|e| AssetError::InvalidInput(e.message().into()))?;
        let size = upload.bytes.len() as u64;
        let format = self
            .policy
            .check(&filename, upload.content_type.as_deref(), size)?;

        // Only an absent or empty name falls back; blank names are rejected.
        let name = match upload.name.as_deref() {
            Some(name) if !name.is_empty() => normalize_name(name),
            _ => normalize_name(&filename),
        }
        .map_err(|e| AssetError::InvalidInput(e.into()))?;
        let description = normalize_description(upload.description.as_deref().unwrap_or(""))
            .map_err(|e| AssetError::InvalidInput(e.into()))?;
        let thumbnail_path = match upload.thumbnail_url.as_deref() {
            Some(url) => validate_thumbnail_url(url)?,
            None => None,
        };

        // Nothing is written for bytes that do not parse as the claimed format.
        let bytes = upload.bytes;
        let bytes = tokio::task::spawn_blocking(move || mesh::parse(&bytes, format).map(|_| bytes))
            .await??;

        let blob = self.blobs.put(&unique_blob_name(&filename), &bytes).await?;

        let new_asset = NewAsset {
            name,
            description,
            original_filename: filename,
            file_size: size,
            file_type: format,
            file_path: blob.clone(),
            thumbnail_path,
            uploaded_by: uploader.to_string(),
        };

        match self.create(new_asset).await {
            Ok(asset) => Ok(asset),
            Err(e) => {
                self.discard_blob(&blob).await;
                Err(e)
            }
        }
    }

    /// Store a record for an already written original blob, then attach a
    /// generated thumbnail unless the caller supplied one.
    pub async fn create(&self, new_asset: NewAsset) -> Result<ModelAsset, AssetError> {
        let has_thumbnail = new_asset.thumbnail_path.is_some();
        let asset = self.repo.insert(new_asset).await?;
        info!(asset_id = %asset.id, format = %asset.file_type, size = asset.file_size, "Model created");

        if !has_thumbnail
            && let Some(thumb) = self.generate_thumbnail(&asset).await
        {
            match self
                .repo
                .set_thumbnail(asset.id, Some(thumb.to_string()))
                .await
            {
                Ok(Some(updated)) => return Ok(updated),
                Ok(None) => self.discard_blob(&thumb).await,
                Err(e) => {
                    warn!(asset_id = %asset.id, error = %e, "Failed to record thumbnail");
                    self.discard_blob(&thumb).await;
                }
            }
        }

        Ok(asset)
    }

    /// Best effort: any failure is logged and yields no thumbnail.
    async fn generate_thumbnail(&self, asset: &ModelAsset) -> Option<BlobRef> {
        let format = asset.file_type;
        let png = match tokio::task::spawn_blocking(move || thumbnail::render_placeholder(format))
            .await
        {
            Ok(Ok(png)) => png,
            Ok(Err(e)) => {
                warn!(asset_id = %asset.id, error = %e, "Thumbnail rendering failed");
                return None;
            }
            Err(e) => {
                warn!(asset_id = %asset.id, error = %e, "Thumbnail task failed");
                return None;
            }
        };

        let name = derived_blob_name(&asset.original_filename, "png");
        match self.blobs.put(&name, &png).await {
            Ok(blob) => Some(blob),
            Err(e) => {
                warn!(asset_id = %asset.id, error = %e, "Failed to store thumbnail");
                None
            }
        }
    }

    async fn discard_blob(&self, blob: &BlobRef) {
        match self.blobs.delete(blob).await {
            Ok(true) => {}
            Ok(false) => warn!(blob = %blob, "Blob already missing"),
            Err(e) => warn!(blob = %blob, error = %e, "Failed to delete blob"),
        }
    }

    pub async fn list(&self, mut filter: AssetFilter) -> Result<Vec<ModelAsset>, AssetError> {
        filter.search = filter
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(self.repo.list(&filter).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<ModelAsset, AssetError> {
        self.repo
            .find(id)
            .await?
            .ok_or_else(AssetError::model_not_found)
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: AssetPatch,
        requester: &str,
    ) -> Result<ModelAsset, AssetError> {
        let patch = AssetPatch {
            name: patch
                .name
                .as_deref()
                .map(normalize_name)
                .transpose()
                .map_err(|e| AssetError::InvalidInput(e.into()))?,
            description: patch
                .description
                .as_deref()
                .map(normalize_description)
                .transpose()
                .map_err(|e| AssetError::InvalidInput(e.into()))?,
        };

        let asset = self.get(id).await?;
        ensure_owner(&asset, requester)?;

        self.repo
            .update_metadata(id, &patch)
            .await?
            .ok_or_else(AssetError::model_not_found)
    }

    /// Remove every blob the asset owns, then the record.
    pub async fn delete(&self, id: Uuid, requester: &str) -> Result<(), AssetError> {
        let asset = self.get(id).await?;
        ensure_owner(&asset, requester)?;

        for blob in asset.owned_blobs() {
            self.discard_blob(&blob).await;
        }

        if !self.repo.delete(id).await? {
            return Err(AssetError::model_not_found());
        }
        info!(asset_id = %id, "Model deleted");
        Ok(())
    }

    pub async fn increment_view(&self, id: Uuid) -> Result<u64, AssetError> {
        self.repo
            .increment(id, Counter::Views)
            .await?
            .ok_or_else(AssetError::model_not_found)
    }

    pub async fn increment_download(&self, id: Uuid) -> Result<u64, AssetError> {
        self.repo
            .increment(id, Counter::Downloads)
            .await?
            .ok_or_else(AssetError::model_not_found)
    }

    pub async fn save_default_view(
        &self,
        id: Uuid,
        view: DefaultView,
        requester: &str,
    ) -> Result<DefaultView, AssetError> {
        view.validate()
            .map_err(|e| AssetError::InvalidInput(e.into()))?;

        let asset = self.get(id).await?;
        ensure_owner(&asset, requester)?;

        if !self.repo.set_default_view(id, &view).await? {
            return Err(AssetError::model_not_found());
        }
        Ok(view)
    }

    pub async fn get_default_view(&self, id: Uuid) -> Result<DefaultView, AssetError> {
        Ok(self.get(id).await?.default_view)
    }

    /// Record a finished conversion. At most one artifact per format survives.
    pub async fn append_artifact(
        &self,
        id: Uuid,
        artifact: ConversionArtifact,
    ) -> Result<AppendOutcome, AssetError> {
        let asset = self.get(id).await?;
        if artifact.format == asset.file_type {
            return Err(AssetError::AlreadyThisFormat(artifact.format));
        }
        Ok(self.repo.append_artifact(id, artifact).await?)
    }

    /// Open the original file, or a converted copy when `format` names one.
    pub async fn open_file(
        &self,
        id: Uuid,
        format: Option<MeshFormat>,
    ) -> Result<ModelFile, AssetError> {
        let asset = self.get(id).await?;

        let (blob, filename, format) = match format {
            Some(format) if format != asset.file_type => {
                let artifact = asset.artifact(format).ok_or_else(|| {
                    AssetError::NotFound(format!("{format} version of this model"))
                })?;
                let extension = format.extension().unwrap_or("bin");
                (
                    artifact.file_path.clone(),
                    swap_extension(&asset.original_filename, extension),
                    format,
                )
            }
            _ => (
                asset.file_path.clone(),
                asset.original_filename.clone(),
                asset.file_type,
            ),
        };

        let size = match self.blobs.size(&blob).await {
            Ok(size) => size,
            Err(StorageError::NotFound(_)) => {
                warn!(asset_id = %id, blob = %blob, "Record references a missing blob");
                return Err(AssetError::NotFound("Model file".into()));
            }
            Err(e) => return Err(e.into()),
        };
        let reader = self.blobs.get_stream(&blob).await?;

        Ok(ModelFile {
            filename,
            format,
            size,
            reader,
        })
    }

    /// Parse the original and normalize it for display.
    pub async fn viewer_geometry(&self, id: Uuid) -> Result<ViewerGeometry, AssetError> {
        let asset = self.get(id).await?;
        let bytes = self.blobs.get(&asset.file_path).await?;
        let format = asset.file_type;

        let (mesh, normalization) = tokio::task::spawn_blocking(move || {
            let mut mesh = mesh::parse(&bytes, format)?;
            let normalization = mesh::normalize(&mut mesh);
            Ok::<_, MeshError>((mesh, normalization))
        })
        .await??;

        Ok(ViewerGeometry {
            format,
            mesh,
            normalization,
        })
    }
}
