use std::time::Duration;

use common::storage::StorageError;
use mesh::{MeshError, MeshFormat};
use thiserror::Error;

use crate::repository::RepositoryError;

/// Failures of the asset lifecycle and conversion services.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("{0}")]
    MalformedInput(String),

    #[error("Model is already in {0} format")]
    AlreadyThisFormat(MeshFormat),

    #[error("Conversion from {from} to {to} is not supported")]
    ConversionUnsupported { from: MeshFormat, to: MeshFormat },

    #[error("{0} not found")]
    NotFound(String),

    #[error("You are not authorized to modify this model")]
    Forbidden,

    #[error("{0}")]
    InvalidInput(String),

    #[error("File exceeds the maximum upload size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Conversion did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("{0}")]
    Internal(String),
}

impl AssetError {
    pub fn model_not_found() -> Self {
        AssetError::NotFound("Model".into())
    }

    /// Storage failure while writing server-generated output. An oversized
    /// artifact is a server-side limit, not a client payload problem.
    pub fn from_artifact_storage(err: StorageError) -> Self {
        match err {
            StorageError::SizeLimitExceeded { actual, limit } => AssetError::Internal(format!(
                "Converted file of {actual} bytes exceeds the blob size limit of {limit} bytes"
            )),
            other => other.into(),
        }
    }
}

impl From<MeshError> for AssetError {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::Malformed { .. } | MeshError::InvalidMesh(_) => {
                AssetError::MalformedInput(err.to_string())
            }
            MeshError::UnsupportedFormat(format) => AssetError::ConversionUnsupported {
                from: format,
                to: format,
            },
            MeshError::UnknownFormat(_) => AssetError::InvalidInput(err.to_string()),
            MeshError::Image(_) => AssetError::Internal(err.to_string()),
        }
    }
}

impl From<StorageError> for AssetError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SizeLimitExceeded { limit, .. } => AssetError::PayloadTooLarge { limit },
            other => AssetError::Internal(format!("Blob storage error: {other}")),
        }
    }
}

impl From<RepositoryError> for AssetError {
    fn from(err: RepositoryError) -> Self {
        AssetError::Internal(format!("Repository error: {err}"))
    }
}

impl From<tokio::task::JoinError> for AssetError {
    fn from(err: tokio::task::JoinError) -> Self {
        AssetError::Internal(format!("Background task failed: {err}"))
    }
}
