use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Body};
use mesh::MeshFormat;
use tokio_util::io::ReaderStream;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::api::{
    ConversionResponse, ConvertRequest, DownloadCountResponse, DownloadQuery, GeometryResponse,
    ModelListQuery, ModelListResponse, ModelResponse, UpdateModelRequest, ViewCountResponse,
};
use crate::models::asset::{AssetFilter, AssetPatch, DefaultView};
use crate::services::{Upload, UploadPolicy};
use crate::state::AppState;
use crate::utils::filename::content_disposition_value;

/// Room for multipart boundaries and the text fields next to the file.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

pub fn model_upload_body_limit(max_upload_size: u64) -> DefaultBodyLimit {
    let max = usize::try_from(max_upload_size).unwrap_or(usize::MAX);
    DefaultBodyLimit::max(max.saturating_add(MULTIPART_OVERHEAD))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Multipart error: {e}"))
    }
}

fn parse_format(value: &str, field: &str) -> Result<MeshFormat, AppError> {
    value
        .parse()
        .map_err(|_| AppError::Validation(format!("{field} must be one of: STL, OBJ, OTHER")))
}

/// Buffer the file field, failing as soon as it outgrows the upload limit.
async fn read_model_field(mut field: Field<'_>, policy: &UploadPolicy) -> Result<Vec<u8>, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        policy.check_size((bytes.len() + chunk.len()) as u64)?;
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn read_text_field(field: Field<'_>, name: &str) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))
}

#[utoipa::path(
    post,
    path = "/api/v1/models",
    tag = "Models",
    operation_id = "uploadModel",
    summary = "Upload a 3D model",
    description = "Uploads an STL or OBJ file in the `modelFile` multipart field. Optional text \
        fields: `name` (defaults to the filename), `description`, and `thumbnailUrl` (replaces \
        the generated thumbnail). The file must parse as its declared format.",
    request_body(content_type = "multipart/form-data", description = "Model file with optional metadata"),
    responses(
        (status = 201, description = "Model created", body = ModelResponse),
        (status = 400, description = "Invalid upload (VALIDATION_ERROR, MALFORMED_INPUT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 413, description = "File too large (PAYLOAD_TOO_LARGE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = %auth_user.user_id))]
pub async fn upload_model(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut upload = Upload::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("modelFile") => {
                upload.filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Validation("File field must have a filename".into()))?;
                upload.content_type = field
                    .content_type()
                    .map(str::to_string)
                    .or_else(|| {
                        mime_guess::from_path(&upload.filename)
                            .first()
                            .map(|m| m.to_string())
                    });
                upload.bytes = read_model_field(field, state.assets.policy()).await?;
                has_file = true;
            }
            Some("name") => upload.name = Some(read_text_field(field, "name").await?),
            Some("description") => {
                upload.description = Some(read_text_field(field, "description").await?)
            }
            Some("thumbnailUrl") => {
                upload.thumbnail_url = Some(read_text_field(field, "thumbnailUrl").await?)
            }
            _ => {} // Ignore unknown fields.
        }
    }

    if !has_file {
        return Err(AppError::Validation("No file uploaded".into()));
    }

    let asset = state.assets.ingest(upload, &auth_user.user_id).await?;
    info!(asset_id = %asset.id, "Model uploaded");

    Ok((
        StatusCode::CREATED,
        Json(ModelResponse::new(asset, state.public_prefix())),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/models",
    tag = "Models",
    operation_id = "listModels",
    summary = "List models",
    description = "Lists all models, newest first. `fileType` filters by exact format; `search` \
        matches name or description case-insensitively.",
    params(ModelListQuery),
    responses(
        (status = 200, description = "Matching models", body = ModelListResponse),
        (status = 400, description = "Invalid filter (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelListQuery>,
) -> Result<Json<ModelListResponse>, AppError> {
    let file_type = query
        .file_type
        .as_deref()
        .map(|t| parse_format(t, "fileType"))
        .transpose()?;

    let filter = AssetFilter {
        file_type,
        search: query.search,
        uploaded_by: None,
    };
    list_response(&state, filter).await
}

#[utoipa::path(
    get,
    path = "/api/v1/models/user/{user_id}",
    tag = "Models",
    operation_id = "listUserModels",
    summary = "List a user's models",
    params(("user_id" = String, Path, description = "Uploader user ID")),
    responses(
        (status = 200, description = "Models uploaded by the user", body = ModelListResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn list_user_models(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ModelListResponse>, AppError> {
    let filter = AssetFilter {
        uploaded_by: Some(user_id),
        ..Default::default()
    };
    list_response(&state, filter).await
}

async fn list_response(
    state: &AppState,
    filter: AssetFilter,
) -> Result<Json<ModelListResponse>, AppError> {
    let assets = state.assets.list(filter).await?;
    let prefix = state.public_prefix();
    Ok(Json(ModelListResponse {
        total: assets.len() as u64,
        models: assets
            .into_iter()
            .map(|a| ModelResponse::new(a, prefix))
            .collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/models/{id}",
    tag = "Models",
    operation_id = "getModel",
    summary = "Get model details",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Model details", body = ModelResponse),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ModelResponse>, AppError> {
    let asset = state.assets.get(id).await?;
    Ok(Json(ModelResponse::new(asset, state.public_prefix())))
}

#[utoipa::path(
    put,
    path = "/api/v1/models/{id}",
    tag = "Models",
    operation_id = "updateModel",
    summary = "Update model metadata",
    description = "Changes `name` and/or `description`. Only the uploader may update a model.",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body = UpdateModelRequest,
    responses(
        (status = 200, description = "Model updated", body = ModelResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id = %id))]
pub async fn update_model(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<UpdateModelRequest>,
) -> Result<Json<ModelResponse>, AppError> {
    let patch = AssetPatch {
        name: payload.name,
        description: payload.description,
    };
    let asset = state.assets.update(id, patch, &auth_user.user_id).await?;
    Ok(Json(ModelResponse::new(asset, state.public_prefix())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/models/{id}",
    tag = "Models",
    operation_id = "deleteModel",
    summary = "Delete a model",
    description = "Deletes the model together with its original file, thumbnail and converted \
        files. Only the uploader may delete a model.",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 204, description = "Model deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id = %id))]
pub async fn delete_model(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.assets.delete(id, &auth_user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/models/{id}/convert",
    tag = "Models",
    operation_id = "convertModel",
    summary = "Convert a model to another format",
    description = "Converts the original file to `targetFormat` and stores the result. A format \
        that was converted before is served from cache (`cached: true`). STL to OBJ is always \
        available; OBJ to STL only when enabled in configuration.",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body = ConvertRequest,
    responses(
        (status = 200, description = "Converted file", body = ConversionResponse),
        (status = 400, description = "Bad target (VALIDATION_ERROR, ALREADY_THIS_FORMAT, MALFORMED_INPUT)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
        (status = 501, description = "Direction not supported (CONVERSION_UNSUPPORTED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id = %id, target = %payload.target_format))]
pub async fn convert_model(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(payload): AppJson<ConvertRequest>,
) -> Result<Json<ConversionResponse>, AppError> {
    let target = parse_format(&payload.target_format, "targetFormat")?;
    let outcome = state
        .conversions
        .convert_within(id, target, state.conversion_timeout())
        .await?;
    Ok(Json(ConversionResponse::new(&outcome, state.public_prefix())))
}

#[utoipa::path(
    post,
    path = "/api/v1/models/{id}/view",
    tag = "Models",
    operation_id = "incrementViewCount",
    summary = "Count a view",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "New view count", body = ViewCountResponse),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn increment_view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ViewCountResponse>, AppError> {
    let view_count = state.assets.increment_view(id).await?;
    Ok(Json(ViewCountResponse { view_count }))
}

#[utoipa::path(
    post,
    path = "/api/v1/models/{id}/download",
    tag = "Models",
    operation_id = "incrementDownloadCount",
    summary = "Count a download",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "New download count", body = DownloadCountResponse),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn increment_download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadCountResponse>, AppError> {
    let download_count = state.assets.increment_download(id).await?;
    Ok(Json(DownloadCountResponse { download_count }))
}

#[utoipa::path(
    get,
    path = "/api/v1/models/{id}/download-file",
    tag = "Models",
    operation_id = "downloadModelFile",
    summary = "Download the model file",
    description = "Streams the original upload, or the converted copy named by `format`.",
    params(("id" = Uuid, Path, description = "Model ID"), DownloadQuery),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Model or converted file not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query), fields(id = %id))]
pub async fn download_file(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let format = query
        .format
        .as_deref()
        .map(|f| parse_format(f, "format"))
        .transpose()?;

    let file = state.assets.open_file(id, format).await?;
    let body = Body::from_stream(ReaderStream::new(file.reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.format.content_type())
        .header(header::CONTENT_LENGTH, file.size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&file.filename),
        )
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

#[utoipa::path(
    get,
    path = "/api/v1/models/{id}/geometry",
    tag = "Models",
    operation_id = "getModelGeometry",
    summary = "Normalized geometry for the viewer",
    description = "Parses the original file, centers it, applies the canonical orientation and \
        scales its largest dimension to 2 units.",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Viewer geometry", body = GeometryResponse),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn get_geometry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GeometryResponse>, AppError> {
    let geometry = state.assets.viewer_geometry(id).await?;
    Ok(Json(geometry.into()))
}

#[utoipa::path(
    post,
    path = "/api/v1/models/{id}/defaultView",
    tag = "Models",
    operation_id = "saveDefaultView",
    summary = "Save the default camera pose",
    params(("id" = Uuid, Path, description = "Model ID")),
    request_body = DefaultView,
    responses(
        (status = 200, description = "Saved pose", body = DefaultView),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, view), fields(id = %id))]
pub async fn save_default_view(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AppJson(view): AppJson<DefaultView>,
) -> Result<Json<DefaultView>, AppError> {
    let saved = state
        .assets
        .save_default_view(id, view, &auth_user.user_id)
        .await?;
    Ok(Json(saved))
}

#[utoipa::path(
    get,
    path = "/api/v1/models/{id}/defaultView",
    tag = "Models",
    operation_id = "getDefaultView",
    summary = "Get the default camera pose",
    params(("id" = Uuid, Path, description = "Model ID")),
    responses(
        (status = 200, description = "Default pose", body = DefaultView),
        (status = 404, description = "Model not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id = %id))]
pub async fn get_default_view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DefaultView>, AppError> {
    Ok(Json(state.assets.get_default_view(id).await?))
}
