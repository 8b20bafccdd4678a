use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "model_asset")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub original_filename: String,
    pub file_size: i64,
    /// `STL`, `OBJ` or `OTHER`.
    pub file_type: String,
    /// Blob ref of the uploaded original.
    pub file_path: String,
    /// Blob ref of a generated thumbnail, or a client-supplied URL.
    #[sea_orm(column_type = "Text", nullable)]
    pub thumbnail_path: Option<String>,
    #[sea_orm(indexed)]
    pub uploaded_by: String,

    // Default viewer pose, flattened.
    pub view_position_x: f64,
    pub view_position_y: f64,
    pub view_position_z: f64,
    pub view_rotation_x: f64,
    pub view_rotation_y: f64,
    pub view_rotation_z: f64,
    pub view_zoom: f64,

    pub view_count: i64,
    pub download_count: i64,

    #[sea_orm(has_many)]
    pub converted_formats: HasMany<super::conversion_artifact::Entity>,

    #[sea_orm(indexed)]
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
