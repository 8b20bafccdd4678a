use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use common::storage::BlobRef;
use mesh::{MeshError, MeshFormat};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use uuid::Uuid;

use super::{AppendOutcome, AssetRepository, RepositoryError};
use crate::entity::{conversion_artifact, model_asset};
use crate::models::asset::{
    AssetFilter, AssetPatch, ConversionArtifact, Counter, DefaultView, ModelAsset, NewAsset, Vec3,
};
use crate::models::shared::escape_like;

/// Postgres-backed asset records.
pub struct SeaOrmAssetRepository {
    db: DatabaseConnection,
}

impl SeaOrmAssetRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn load_artifacts(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<ConversionArtifact>>, RepositoryError> {
        let mut grouped: HashMap<Uuid, Vec<ConversionArtifact>> = HashMap::new();
        if ids.is_empty() {
            return Ok(grouped);
        }

        let rows = conversion_artifact::Entity::find()
            .filter(conversion_artifact::Column::AssetId.is_in(ids.iter().copied()))
            .order_by_asc(conversion_artifact::Column::CreatedAt)
            .order_by_asc(conversion_artifact::Column::Id)
            .all(&self.db)
            .await?;

        for row in rows {
            let asset_id = row.asset_id;
            grouped
                .entry(asset_id)
                .or_default()
                .push(artifact_from_row(row)?);
        }
        Ok(grouped)
    }
}

fn db_size(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn artifact_from_row(row: conversion_artifact::Model) -> Result<ConversionArtifact, RepositoryError> {
    let corrupt = |reason: String| RepositoryError::Corrupt {
        id: format!("conversion_artifact/{}", row.id),
        reason,
    };

    Ok(ConversionArtifact {
        format: row
            .format
            .parse()
            .map_err(|e: MeshError| corrupt(e.to_string()))?,
        file_path: BlobRef::parse(&row.file_path).map_err(|e| corrupt(e.to_string()))?,
        file_size: u64::try_from(row.file_size)
            .map_err(|_| corrupt(format!("negative file size {}", row.file_size)))?,
        created_at: row.created_at,
    })
}

fn asset_from_row(
    row: model_asset::Model,
    converted_formats: Vec<ConversionArtifact>,
) -> Result<ModelAsset, RepositoryError> {
    let id = row.id;
    let corrupt = |reason: String| RepositoryError::Corrupt {
        id: format!("model_asset/{id}"),
        reason,
    };

    let file_type: MeshFormat = row
        .file_type
        .parse()
        .map_err(|e: MeshError| corrupt(e.to_string()))?;
    let file_path = BlobRef::parse(&row.file_path).map_err(|e| corrupt(e.to_string()))?;

    Ok(ModelAsset {
        id,
        name: row.name,
        description: row.description,
        original_filename: row.original_filename,
        file_size: u64::try_from(row.file_size).unwrap_or_default(),
        file_type,
        file_path,
        thumbnail_path: row.thumbnail_path,
        converted_formats,
        uploaded_by: row.uploaded_by,
        default_view: DefaultView {
            position: Vec3::new(row.view_position_x, row.view_position_y, row.view_position_z),
            rotation: Vec3::new(row.view_rotation_x, row.view_rotation_y, row.view_rotation_z),
            zoom: row.view_zoom,
        },
        view_count: u64::try_from(row.view_count).unwrap_or_default(),
        download_count: u64::try_from(row.download_count).unwrap_or_default(),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl AssetRepository for SeaOrmAssetRepository {
    async fn insert(&self, asset: NewAsset) -> Result<ModelAsset, RepositoryError> {
        let now = Utc::now();
        let view = DefaultView::default();

        let model = model_asset::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(asset.name),
            description: Set(asset.description),
            original_filename: Set(asset.original_filename),
            file_size: Set(db_size(asset.file_size)),
            file_type: Set(asset.file_type.as_str().to_string()),
            file_path: Set(asset.file_path.into_string()),
            thumbnail_path: Set(asset.thumbnail_path),
            uploaded_by: Set(asset.uploaded_by),
            view_position_x: Set(view.position.x),
            view_position_y: Set(view.position.y),
            view_position_z: Set(view.position.z),
            view_rotation_x: Set(view.rotation.x),
            view_rotation_y: Set(view.rotation.y),
            view_rotation_z: Set(view.rotation.z),
            view_zoom: Set(view.zoom),
            view_count: Set(0),
            download_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let row = model.insert(&self.db).await?;
        asset_from_row(row, Vec::new())
    }

    async fn find(&self, id: Uuid) -> Result<Option<ModelAsset>, RepositoryError> {
        let Some(row) = model_asset::Entity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };
        let artifacts = self
            .load_artifacts(&[id])
            .await?
            .remove(&id)
            .unwrap_or_default();
        asset_from_row(row, artifacts).map(Some)
    }

    async fn list(&self, filter: &AssetFilter) -> Result<Vec<ModelAsset>, RepositoryError> {
        let mut select = model_asset::Entity::find();

        if let Some(file_type) = filter.file_type {
            select = select.filter(model_asset::Column::FileType.eq(file_type.as_str()));
        }

        if let Some(ref user) = filter.uploaded_by {
            select = select.filter(model_asset::Column::UploadedBy.eq(user.as_str()));
        }

        if let Some(ref search) = filter.search {
            let pattern = format!("%{}%", escape_like(search).to_lowercase());
            select = select.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(model_asset::Column::Name)))
                            .like(LikeExpr::new(pattern.clone()).escape('\\')),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(model_asset::Column::Description)))
                            .like(LikeExpr::new(pattern).escape('\\')),
                    ),
            );
        }

        let rows = select
            .order_by_desc(model_asset::Column::CreatedAt)
            .order_by_desc(model_asset::Column::Id)
            .all(&self.db)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut artifacts = self.load_artifacts(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let converted = artifacts.remove(&row.id).unwrap_or_default();
                asset_from_row(row, converted)
            })
            .collect()
    }

    async fn update_metadata(
        &self,
        id: Uuid,
        patch: &AssetPatch,
    ) -> Result<Option<ModelAsset>, RepositoryError> {
        let mut update = model_asset::Entity::update_many()
            .col_expr(model_asset::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(model_asset::Column::Id.eq(id));

        if let Some(ref name) = patch.name {
            update = update.col_expr(model_asset::Column::Name, Expr::value(name.clone()));
        }
        if let Some(ref description) = patch.description {
            update = update.col_expr(
                model_asset::Column::Description,
                Expr::value(description.clone()),
            );
        }

        if update.exec(&self.db).await?.rows_affected == 0 {
            return Ok(None);
        }
        self.find(id).await
    }

    async fn set_thumbnail(
        &self,
        id: Uuid,
        thumbnail: Option<String>,
    ) -> Result<Option<ModelAsset>, RepositoryError> {
        let result = model_asset::Entity::update_many()
            .col_expr(model_asset::Column::ThumbnailPath, Expr::value(thumbnail))
            .col_expr(model_asset::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(model_asset::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.find(id).await
    }

    async fn set_default_view(
        &self,
        id: Uuid,
        view: &DefaultView,
    ) -> Result<bool, RepositoryError> {
        let result = model_asset::Entity::update_many()
            .col_expr(model_asset::Column::ViewPositionX, Expr::value(view.position.x))
            .col_expr(model_asset::Column::ViewPositionY, Expr::value(view.position.y))
            .col_expr(model_asset::Column::ViewPositionZ, Expr::value(view.position.z))
            .col_expr(model_asset::Column::ViewRotationX, Expr::value(view.rotation.x))
            .col_expr(model_asset::Column::ViewRotationY, Expr::value(view.rotation.y))
            .col_expr(model_asset::Column::ViewRotationZ, Expr::value(view.rotation.z))
            .col_expr(model_asset::Column::ViewZoom, Expr::value(view.zoom))
            .col_expr(model_asset::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(model_asset::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn increment(&self, id: Uuid, counter: Counter) -> Result<Option<u64>, RepositoryError> {
        let column = match counter {
            Counter::Views => model_asset::Column::ViewCount,
            Counter::Downloads => model_asset::Column::DownloadCount,
        };

        // Single UPDATE ... RETURNING so concurrent increments never collapse.
        let rows = model_asset::Entity::update_many()
            .col_expr(column, Expr::col(column).add(1))
            .filter(model_asset::Column::Id.eq(id))
            .exec_with_returning(&self.db)
            .await?;

        Ok(rows.first().map(|row| {
            let value = match counter {
                Counter::Views => row.view_count,
                Counter::Downloads => row.download_count,
            };
            u64::try_from(value).unwrap_or_default()
        }))
    }

    async fn append_artifact(
        &self,
        id: Uuid,
        artifact: ConversionArtifact,
    ) -> Result<AppendOutcome, RepositoryError> {
        if model_asset::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .is_none()
        {
            return Ok(AppendOutcome::MissingAsset);
        }

        let format = artifact.format.as_str();
        let model = conversion_artifact::ActiveModel {
            asset_id: Set(id),
            format: Set(format.to_string()),
            file_path: Set(artifact.file_path.into_string()),
            file_size: Set(db_size(artifact.file_size)),
            created_at: Set(artifact.created_at),
            ..Default::default()
        };

        match model.insert(&self.db).await {
            Ok(row) => Ok(AppendOutcome::Appended(artifact_from_row(row)?)),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                let existing = conversion_artifact::Entity::find()
                    .filter(conversion_artifact::Column::AssetId.eq(id))
                    .filter(conversion_artifact::Column::Format.eq(format))
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| {
                        DbErr::Custom(
                            "UniqueConstraintViolation but existing artifact not found".to_string(),
                        )
                    })?;
                Ok(AppendOutcome::Existing(artifact_from_row(existing)?))
            }
            // The asset was deleted between the lookup and the insert.
            Err(e) if matches!(e.sql_err(), Some(SqlErr::ForeignKeyConstraintViolation(_))) => {
                Ok(AppendOutcome::MissingAsset)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let txn = self.db.begin().await?;

        conversion_artifact::Entity::delete_many()
            .filter(conversion_artifact::Column::AssetId.eq(id))
            .exec(&txn)
            .await?;
        let result = model_asset::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;
        Ok(result.rows_affected > 0)
    }
}
