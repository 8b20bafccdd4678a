use chrono::{DateTime, Utc};
use common::storage::BlobRef;
use mesh::{MeshFormat, Normals};
use serde::{Deserialize, Serialize};

use crate::models::asset::{ConversionArtifact, DefaultView, ModelAsset};
use crate::services::{ConversionOutcome, ViewerGeometry};

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ModelListQuery {
    /// Exact format filter: `STL`, `OBJ` or `OTHER` (case-insensitive).
    pub file_type: Option<String>,
    /// Case-insensitive substring matched against name and description.
    pub search: Option<String>,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// Converted format to download instead of the original.
    pub format: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateModelRequest {
    #[schema(example = "Shelf bracket")]
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertRequest {
    #[schema(example = "OBJ")]
    pub target_format: String,
}

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResponse {
    pub format: MeshFormat,
    /// Blob ref of the converted file.
    #[schema(example = "1739961234567890123-bracket.obj")]
    pub file_path: String,
    #[schema(example = "/uploads/1739961234567890123-bracket.obj")]
    pub file_url: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

impl ArtifactResponse {
    pub fn new(artifact: &ConversionArtifact, public_prefix: &str) -> Self {
        Self {
            format: artifact.format,
            file_path: artifact.file_path.to_string(),
            file_url: artifact.file_path.public_url(public_prefix),
            file_size: artifact.file_size,
            created_at: artifact.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelResponse {
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub id: String,
    pub name: String,
    pub description: String,
    #[schema(example = "bracket.stl")]
    pub original_filename: String,
    pub file_size: u64,
    pub file_type: MeshFormat,
    pub file_path: String,
    pub file_url: String,
    pub thumbnail_path: Option<String>,
    /// Fetchable thumbnail location: a public blob URL or the client URL as given.
    pub thumbnail_url: Option<String>,
    pub converted_formats: Vec<ArtifactResponse>,
    pub uploaded_by: String,
    pub default_view: DefaultView,
    pub view_count: u64,
    pub download_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModelResponse {
    pub fn new(asset: ModelAsset, public_prefix: &str) -> Self {
        let thumbnail_url = asset.thumbnail_path.as_deref().map(|t| match BlobRef::parse(t) {
            Ok(blob) => blob.public_url(public_prefix),
            Err(_) => t.to_string(),
        });

        Self {
            id: asset.id.to_string(),
            file_url: asset.file_path.public_url(public_prefix),
            file_path: asset.file_path.into_string(),
            converted_formats: asset
                .converted_formats
                .iter()
                .map(|a| ArtifactResponse::new(a, public_prefix))
                .collect(),
            name: asset.name,
            description: asset.description,
            original_filename: asset.original_filename,
            file_size: asset.file_size,
            file_type: asset.file_type,
            thumbnail_path: asset.thumbnail_path,
            thumbnail_url,
            uploaded_by: asset.uploaded_by,
            default_view: asset.default_view,
            view_count: asset.view_count,
            download_count: asset.download_count,
            created_at: asset.created_at,
            updated_at: asset.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ModelListResponse {
    pub models: Vec<ModelResponse>,
    pub total: u64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ConversionResponse {
    pub artifact: ArtifactResponse,
    /// `true` when the artifact already existed and no work was done.
    pub cached: bool,
}

impl ConversionResponse {
    pub fn new(outcome: &ConversionOutcome, public_prefix: &str) -> Self {
        Self {
            artifact: ArtifactResponse::new(&outcome.artifact, public_prefix),
            cached: outcome.cached,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewCountResponse {
    pub view_count: u64,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadCountResponse {
    pub download_count: u64,
}

/// Viewer-ready geometry: centered, canonically oriented, scaled to 2 units.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeometryResponse {
    pub format: MeshFormat,
    /// Flat `x, y, z` triples.
    pub positions: Vec<f32>,
    /// Flat `x, y, z` triples, one per vertex; empty when the source had none.
    pub normals: Vec<f32>,
    /// Triangle corner indices into `positions`.
    pub indices: Vec<u32>,
    pub vertex_count: usize,
    pub face_count: usize,
    /// Original bounding-box center that was moved to the origin.
    pub center: Vec<f32>,
    pub scale: f32,
}

impl From<ViewerGeometry> for GeometryResponse {
    fn from(geometry: ViewerGeometry) -> Self {
        let mesh = geometry.mesh;

        let normals = match &mesh.normals {
            Some(Normals::PerVertex(normals)) => normals.iter().flatten().copied().collect(),
            // Spread each face normal onto its corners.
            Some(Normals::PerFace(normals)) => {
                let mut per_vertex = vec![[0.0f32; 3]; mesh.vertices.len()];
                for (face, normal) in mesh.faces.iter().zip(normals) {
                    for &index in face {
                        if let Some(slot) = per_vertex.get_mut(index as usize) {
                            *slot = *normal;
                        }
                    }
                }
                per_vertex.into_iter().flatten().collect()
            }
            None => Vec::new(),
        };

        Self {
            format: geometry.format,
            vertex_count: mesh.vertex_count(),
            face_count: mesh.face_count(),
            positions: mesh.vertices.iter().flatten().copied().collect(),
            normals,
            indices: mesh.faces.iter().flatten().copied().collect(),
            center: geometry.normalization.center.to_vec(),
            scale: geometry.normalization.scale,
        }
    }
}
