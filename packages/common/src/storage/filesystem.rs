use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use super::error::StorageError;
use super::name::BlobRef;
use super::traits::{BlobStore, BoxReader};

const STAGING_DIR: &str = ".tmp";

/// Blob store that keeps every blob as `{root}/{name}`.
///
/// Writes are staged under `{root}/.tmp` and renamed into place, so a
/// reader never observes a partially written blob.
pub struct FilesystemBlobStore {
    root: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create the store, ensuring the root and staging directories exist.
    ///
    /// This is the explicit startup step for storage; it fails if the
    /// directories cannot be created.
    pub async fn new(root: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(root.join(STAGING_DIR)).await?;
        Ok(Self { root, max_size })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, blob: &BlobRef) -> PathBuf {
        self.root.join(blob.as_str())
    }

    fn staging_path(&self) -> PathBuf {
        self.root
            .join(STAGING_DIR)
            .join(uuid::Uuid::new_v4().to_string())
    }

    fn too_large(&self, actual: u64) -> StorageError {
        StorageError::SizeLimitExceeded {
            actual,
            limit: self.max_size,
        }
    }

    /// Resolve `name` to a free slot in the store.
    async fn reserve(&self, name: &str) -> Result<(BlobRef, PathBuf), StorageError> {
        let blob = BlobRef::parse(name)?;
        let target = self.path_of(&blob);
        if fs::try_exists(&target).await? {
            return Err(StorageError::AlreadyExists(blob.into_string()));
        }
        Ok((blob, target))
    }

    /// Move a fully written staging file into place, removing it on failure.
    async fn commit(staged: &Path, target: &Path) -> Result<(), StorageError> {
        if let Err(e) = fs::rename(staged, target).await {
            let _ = fs::remove_file(staged).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Copy `reader` into `staged`, stopping once the size cap is exceeded.
    async fn stage(&self, staged: &Path, reader: BoxReader) -> Result<(), StorageError> {
        let mut file = fs::File::create(staged).await?;
        // One byte past the cap is enough to detect an oversized blob.
        let mut bounded = reader.take(self.max_size.saturating_add(1));
        let written = tokio::io::copy(&mut bounded, &mut file).await?;
        file.flush().await?;

        if written > self.max_size {
            return Err(self.too_large(written));
        }
        Ok(())
    }
}

fn missing_as_not_found(blob: &BlobRef, e: std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound(blob.to_string()),
        _ => e.into(),
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, name: &str, data: &[u8]) -> Result<BlobRef, StorageError> {
        let (blob, target) = self.reserve(name).await?;
        if data.len() as u64 > self.max_size {
            return Err(self.too_large(data.len() as u64));
        }

        let staged = self.staging_path();
        if let Err(e) = fs::write(&staged, data).await {
            let _ = fs::remove_file(&staged).await;
            return Err(e.into());
        }
        Self::commit(&staged, &target).await?;
        Ok(blob)
    }

    async fn put_stream(&self, name: &str, reader: BoxReader) -> Result<BlobRef, StorageError> {
        let (blob, target) = self.reserve(name).await?;

        let staged = self.staging_path();
        if let Err(e) = self.stage(&staged, reader).await {
            let _ = fs::remove_file(&staged).await;
            return Err(e);
        }
        Self::commit(&staged, &target).await?;
        Ok(blob)
    }

    async fn get_stream(&self, blob: &BlobRef) -> Result<BoxReader, StorageError> {
        let file = fs::File::open(self.path_of(blob))
            .await
            .map_err(|e| missing_as_not_found(blob, e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    async fn exists(&self, blob: &BlobRef) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.path_of(blob)).await?)
    }

    async fn delete(&self, blob: &BlobRef) -> Result<bool, StorageError> {
        match fs::remove_file(self.path_of(blob)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(&self, blob: &BlobRef) -> Result<u64, StorageError> {
        let meta = fs::metadata(self.path_of(blob))
            .await
            .map_err(|e| missing_as_not_found(blob, e))?;
        Ok(meta.len())
    }
}
