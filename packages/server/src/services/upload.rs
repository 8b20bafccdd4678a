use mesh::MeshFormat;
use tracing::debug;

use super::AssetError;

/// MIME types browsers and tools commonly send for each mesh format.
const STL_MIME_TYPES: &[&str] = &[
    "model/stl",
    "model/x.stl-binary",
    "model/x.stl-ascii",
    "application/sla",
    "application/vnd.ms-pki.stl",
    "application/octet-stream",
];
const OBJ_MIME_TYPES: &[&str] = &[
    "model/obj",
    "text/plain",
    "application/x-tgif",
    "application/octet-stream",
];

/// Checks applied to an upload before anything is parsed or written.
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub max_size: u64,
}

impl UploadPolicy {
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    /// Reject oversized payloads early, while the body is still streaming.
    pub fn check_size(&self, size: u64) -> Result<(), AssetError> {
        if size > self.max_size {
            return Err(AssetError::PayloadTooLarge {
                limit: self.max_size,
            });
        }
        Ok(())
    }

    /// Validate an upload and return its format.
    ///
    /// The extension decides; the declared MIME type is only logged when it
    /// disagrees.
    pub fn check(
        &self,
        filename: &str,
        content_type: Option<&str>,
        size: u64,
    ) -> Result<MeshFormat, AssetError> {
        self.check_size(size)?;

        let format = MeshFormat::detect(filename);
        if !format.is_mesh() {
            return Err(AssetError::InvalidInput(
                "Invalid file type. Only STL and OBJ files are allowed.".into(),
            ));
        }

        if let Some(mime) = content_type {
            let essence = mime.split(';').next().unwrap_or(mime).trim().to_ascii_lowercase();
            let expected = match format {
                MeshFormat::Stl => STL_MIME_TYPES,
                _ => OBJ_MIME_TYPES,
            };
            if !expected.contains(&essence.as_str()) {
                debug!(filename, mime = %essence, %format, "MIME type disagrees with extension");
            }
        }

        Ok(format)
    }
}
