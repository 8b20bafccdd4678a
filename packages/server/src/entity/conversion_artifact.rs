use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A derived copy of a model asset in another mesh format.
///
/// At most one row per `(asset_id, format)`.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conversion_artifact")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "asset_format")]
    pub asset_id: Uuid,
    #[sea_orm(belongs_to, from = "asset_id", to = "id")]
    pub asset: HasOne<super::model_asset::Entity>,

    #[sea_orm(unique_key = "asset_format")]
    pub format: String,
    pub file_path: String,
    pub file_size: i64,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
