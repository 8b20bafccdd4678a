use thiserror::Error;

use crate::format::MeshFormat;

/// Errors produced by the mesh pipeline.
#[derive(Debug, Error)]
pub enum MeshError {
    /// The input bytes or text could not be parsed as the given format.
    #[error("malformed {format} input: {message}")]
    Malformed { format: MeshFormat, message: String },

    /// The format has no codec.
    #[error("no codec for format {0}")]
    UnsupportedFormat(MeshFormat),

    /// A format name that does not match any known format.
    #[error("unknown format: {0}")]
    UnknownFormat(String),

    /// The in-memory mesh is inconsistent (e.g. a face index out of range).
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

impl MeshError {
    pub(crate) fn malformed(format: MeshFormat, message: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            message: message.into(),
        }
    }
}
