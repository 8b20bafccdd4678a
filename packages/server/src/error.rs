use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::services::AssetError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `MALFORMED_INPUT`,
    /// `ALREADY_THIS_FORMAT`, `CONVERSION_UNSUPPORTED`, `TOKEN_MISSING`,
    /// `TOKEN_INVALID`, `PERMISSION_DENIED`, `NOT_FOUND`, `PAYLOAD_TOO_LARGE`,
    /// `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Invalid file type. Only STL and OBJ files are allowed.")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    MalformedInput(String),
    AlreadyThisFormat(String),
    ConversionUnsupported(String),
    TokenMissing,
    TokenInvalid,
    PermissionDenied(String),
    NotFound(String),
    PayloadTooLarge(String),
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MalformedInput(_) | AppError::AlreadyThisFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::ConversionUnsupported(_) => StatusCode::NOT_IMPLEMENTED,
            AppError::TokenMissing | AppError::TokenInvalid => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::MalformedInput(_) => "MALFORMED_INPUT",
            AppError::AlreadyThisFormat(_) => "ALREADY_THIS_FORMAT",
            AppError::ConversionUnsupported(_) => "CONVERSION_UNSUPPORTED",
            AppError::TokenMissing => "TOKEN_MISSING",
            AppError::TokenInvalid => "TOKEN_INVALID",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-facing message; internal details are logged instead.
    fn into_message(self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::MalformedInput(msg)
            | AppError::AlreadyThisFormat(msg)
            | AppError::ConversionUnsupported(msg)
            | AppError::PermissionDenied(msg)
            | AppError::NotFound(msg)
            | AppError::PayloadTooLarge(msg) => msg,
            AppError::TokenMissing => "Authentication required".into(),
            AppError::TokenInvalid => "Invalid or expired token".into(),
            AppError::Internal(detail) => {
                tracing::error!(%detail, "Internal error");
                "An unexpected error occurred".into()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            code: self.code(),
            message: self.into_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AssetError> for AppError {
    fn from(err: AssetError) -> Self {
        let message = err.to_string();
        match err {
            AssetError::InvalidInput(_) => AppError::Validation(message),
            AssetError::MalformedInput(_) => AppError::MalformedInput(message),
            AssetError::AlreadyThisFormat(_) => AppError::AlreadyThisFormat(message),
            AssetError::ConversionUnsupported { .. } => AppError::ConversionUnsupported(message),
            AssetError::NotFound(_) => AppError::NotFound(message),
            AssetError::Forbidden => AppError::PermissionDenied(message),
            AssetError::PayloadTooLarge { .. } => AppError::PayloadTooLarge(message),
            AssetError::Cancelled | AssetError::TimedOut(_) | AssetError::Internal(_) => {
                AppError::Internal(message)
            }
        }
    }
}
