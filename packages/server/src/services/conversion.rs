use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::storage::{BlobRef, BlobStore, derived_blob_name};
use mesh::MeshFormat;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AssetError, AssetLifecycleManager};
use crate::models::asset::ConversionArtifact;
use crate::repository::AppendOutcome;

/// Which conversion directions are enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionPolicy {
    pub allow_obj_to_stl: bool,
}

impl ConversionPolicy {
    pub fn supports(&self, from: MeshFormat, to: MeshFormat) -> bool {
        match (from, to) {
            (MeshFormat::Stl, MeshFormat::Obj) => true,
            (MeshFormat::Obj, MeshFormat::Stl) => self.allow_obj_to_stl,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOutcome {
    pub artifact: ConversionArtifact,
    /// The artifact existed already; nothing was converted.
    pub cached: bool,
}

/// Produces and caches converted copies of model assets.
pub struct ConversionEngine {
    assets: Arc<AssetLifecycleManager>,
    blobs: Arc<dyn BlobStore>,
    policy: ConversionPolicy,
}

impl ConversionEngine {
    pub fn new(
        assets: Arc<AssetLifecycleManager>,
        blobs: Arc<dyn BlobStore>,
        policy: ConversionPolicy,
    ) -> Self {
        Self {
            assets,
            blobs,
            policy,
        }
    }

    /// [`convert`](Self::convert) with the load and transcode phase bounded by
    /// `timeout`. On expiry the token is cancelled, so blocking work stops at
    /// its next checkpoint and nothing has been written. Once output exists it
    /// is persisted to completion regardless of the deadline.
    pub async fn convert_within(
        &self,
        id: Uuid,
        target: MeshFormat,
        timeout: Duration,
    ) -> Result<ConversionOutcome, AssetError> {
        let cancel = CancellationToken::new();
        let prepared = match tokio::time::timeout(timeout, self.prepare(id, target, &cancel)).await
        {
            Ok(result) => result?,
            Err(_) => {
                cancel.cancel();
                warn!(asset_id = %id, %target, ?timeout, "Conversion timed out");
                return Err(AssetError::TimedOut(timeout));
            }
        };
        self.finish(prepared).await
    }

    pub async fn convert(
        &self,
        id: Uuid,
        target: MeshFormat,
        cancel: &CancellationToken,
    ) -> Result<ConversionOutcome, AssetError> {
        let prepared = self.prepare(id, target, cancel).await?;
        self.finish(prepared).await
    }

    /// Everything up to and including serialization. Writes nothing.
    async fn prepare(
        &self,
        id: Uuid,
        target: MeshFormat,
        cancel: &CancellationToken,
    ) -> Result<Prepared, AssetError> {
        let asset = self.assets.get(id).await?;
        let source = asset.file_type;

        let Some(extension) = target.extension() else {
            return Err(AssetError::ConversionUnsupported {
                from: source,
                to: target,
            });
        };
        if target == source {
            return Err(AssetError::AlreadyThisFormat(target));
        }

        if let Some(existing) = asset.artifact(target) {
            debug!(asset_id = %id, %target, "Serving cached conversion");
            return Ok(Prepared::Cached(existing.clone()));
        }

        if !self.policy.supports(source, target) {
            return Err(AssetError::ConversionUnsupported {
                from: source,
                to: target,
            });
        }

        let bytes = self.blobs.get(&asset.file_path).await?;
        if cancel.is_cancelled() {
            return Err(AssetError::Cancelled);
        }

        let token = cancel.clone();
        let output = tokio::task::spawn_blocking(move || {
            let mesh = mesh::parse(&bytes, source)?;
            if token.is_cancelled() {
                return Err(AssetError::Cancelled);
            }
            Ok(mesh::serialize(&mesh, target)?)
        })
        .await??;

        if cancel.is_cancelled() {
            return Err(AssetError::Cancelled);
        }

        Ok(Prepared::Converted(PendingArtifact {
            asset_id: id,
            source,
            target,
            blob_name: derived_blob_name(&asset.original_filename, extension),
            bytes: output,
        }))
    }

    async fn finish(&self, prepared: Prepared) -> Result<ConversionOutcome, AssetError> {
        match prepared {
            Prepared::Cached(artifact) => Ok(ConversionOutcome {
                artifact,
                cached: true,
            }),
            Prepared::Converted(pending) => {
                // Detached so a dropped caller cannot strand a half-recorded blob.
                let writer = ArtifactWriter {
                    assets: self.assets.clone(),
                    blobs: self.blobs.clone(),
                };
                tokio::spawn(async move { writer.persist(pending).await }).await?
            }
        }
    }
}

enum Prepared {
    Cached(ConversionArtifact),
    Converted(PendingArtifact),
}

/// Serialized output not yet stored.
struct PendingArtifact {
    asset_id: Uuid,
    source: MeshFormat,
    target: MeshFormat,
    blob_name: String,
    bytes: Vec<u8>,
}

struct ArtifactWriter {
    assets: Arc<AssetLifecycleManager>,
    blobs: Arc<dyn BlobStore>,
}

impl ArtifactWriter {
    async fn persist(&self, pending: PendingArtifact) -> Result<ConversionOutcome, AssetError> {
        let PendingArtifact {
            asset_id: id,
            source,
            target,
            blob_name,
            bytes,
        } = pending;

        let blob = self
            .blobs
            .put(&blob_name, &bytes)
            .await
            .map_err(AssetError::from_artifact_storage)?;
        let file_size = match self.blobs.size(&blob).await {
            Ok(size) => size,
            Err(e) => {
                self.discard(&blob).await;
                return Err(e.into());
            }
        };

        let artifact = ConversionArtifact {
            format: target,
            file_path: blob.clone(),
            file_size,
            created_at: Utc::now(),
        };

        match self.assets.append_artifact(id, artifact).await {
            Ok(AppendOutcome::Appended(artifact)) => {
                info!(asset_id = %id, from = %source, to = %target, size = file_size, "Model converted");
                Ok(ConversionOutcome {
                    artifact,
                    cached: false,
                })
            }
            Ok(AppendOutcome::Existing(artifact)) => {
                info!(asset_id = %id, %target, "Concurrent conversion won, discarding duplicate");
                self.discard(&blob).await;
                Ok(ConversionOutcome {
                    artifact,
                    cached: true,
                })
            }
            Ok(AppendOutcome::MissingAsset) => {
                self.discard(&blob).await;
                Err(AssetError::model_not_found())
            }
            Err(e) => {
                self.discard(&blob).await;
                Err(e)
            }
        }
    }

    async fn discard(&self, blob: &BlobRef) {
        if let Err(e) = self.blobs.delete(blob).await {
            warn!(blob = %blob, error = %e, "Failed to delete orphaned conversion output");
        }
    }
}
