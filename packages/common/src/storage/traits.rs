use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::name::BlobRef;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Flat, name-addressed blob storage.
///
/// Callers are responsible for choosing unique names (see
/// [`unique_blob_name`](super::unique_blob_name)); writing to a name that
/// already exists fails with [`StorageError::AlreadyExists`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `name` and return the reference.
    async fn put(&self, name: &str, data: &[u8]) -> Result<BlobRef, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(name, reader).await
    }

    /// Store data from an async reader under `name`.
    async fn put_stream(&self, name: &str, reader: BoxReader) -> Result<BlobRef, StorageError>;

    /// Retrieve all bytes for a blob.
    async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(blob).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve a blob as a streaming async reader.
    async fn get_stream(&self, blob: &BlobRef) -> Result<BoxReader, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, blob: &BlobRef) -> Result<bool, StorageError>;

    /// Delete a blob.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, blob: &BlobRef) -> Result<bool, StorageError>;

    /// Get the size of a blob in bytes.
    async fn size(&self, blob: &BlobRef) -> Result<u64, StorageError>;
}
