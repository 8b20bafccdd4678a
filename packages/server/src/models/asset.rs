use chrono::{DateTime, Utc};
use common::storage::BlobRef;
use mesh::MeshFormat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A point or Euler rotation in viewer space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Camera pose the viewer opens a model with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DefaultView {
    pub position: Vec3,
    pub rotation: Vec3,
    #[schema(example = 1.0)]
    pub zoom: f64,
}

impl Default for DefaultView {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: Vec3::new(0.0, 0.0, 0.0),
            zoom: 1.0,
        }
    }
}

impl DefaultView {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.position.is_finite() || !self.rotation.is_finite() || !self.zoom.is_finite() {
            return Err("View components must be finite numbers");
        }
        if self.zoom <= 0.0 {
            return Err("Zoom must be greater than zero");
        }
        Ok(())
    }
}

/// A stored copy of an asset in another mesh format.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionArtifact {
    pub format: MeshFormat,
    pub file_path: BlobRef,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelAsset {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub original_filename: String,
    pub file_size: u64,
    pub file_type: MeshFormat,
    pub file_path: BlobRef,
    /// Either a blob ref produced by the thumbnail renderer or a client URL.
    pub thumbnail_path: Option<String>,
    /// Ordered by `created_at`, at most one entry per format.
    pub converted_formats: Vec<ConversionArtifact>,
    pub uploaded_by: String,
    pub default_view: DefaultView,
    pub view_count: u64,
    pub download_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelAsset {
    pub fn artifact(&self, format: MeshFormat) -> Option<&ConversionArtifact> {
        self.converted_formats.iter().find(|a| a.format == format)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.uploaded_by == user_id
    }

    /// The thumbnail as a blob ref, when it lives in the blob store.
    ///
    /// Client-supplied thumbnails are URLs and never parse as flat names.
    pub fn managed_thumbnail(&self) -> Option<BlobRef> {
        self.thumbnail_path
            .as_deref()
            .and_then(|t| BlobRef::parse(t).ok())
    }

    /// Every blob this asset owns: original, managed thumbnail, artifacts.
    pub fn owned_blobs(&self) -> Vec<BlobRef> {
        let mut refs = Vec::with_capacity(2 + self.converted_formats.len());
        refs.push(self.file_path.clone());
        refs.extend(self.managed_thumbnail());
        refs.extend(self.converted_formats.iter().map(|a| a.file_path.clone()));
        refs
    }
}

/// Everything needed to insert a fresh asset record.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub name: String,
    pub description: String,
    pub original_filename: String,
    pub file_size: u64,
    pub file_type: MeshFormat,
    pub file_path: BlobRef,
    pub thumbnail_path: Option<String>,
    pub uploaded_by: String,
}

/// Metadata fields an owner may change.
#[derive(Debug, Clone, Default)]
pub struct AssetPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    pub file_type: Option<MeshFormat>,
    /// Case-insensitive substring over name or description.
    pub search: Option<String>,
    pub uploaded_by: Option<String>,
}

impl AssetFilter {
    pub fn matches(&self, asset: &ModelAsset) -> bool {
        if let Some(file_type) = self.file_type
            && asset.file_type != file_type
        {
            return false;
        }
        if let Some(user) = &self.uploaded_by
            && &asset.uploaded_by != user
        {
            return false;
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            return asset.name.to_lowercase().contains(&needle)
                || asset.description.to_lowercase().contains(&needle);
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Views,
    Downloads,
}
