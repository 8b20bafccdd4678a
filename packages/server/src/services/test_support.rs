use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::storage::{BlobRef, BlobStore, BoxReader, FilesystemBlobStore, StorageError};
use mesh::{Mesh, MeshFormat};
use tempfile::TempDir;

use super::{AssetLifecycleManager, ConversionEngine, ConversionPolicy, Upload, UploadPolicy};
use crate::models::asset::ModelAsset;
use crate::repository::MemoryAssetRepository;

pub const MAX_UPLOAD: u64 = 4096;

/// Unit square in the XY plane as a single polygon.
pub const OBJ_QUAD: &str = "# quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";

pub fn stl_tetrahedron() -> Vec<u8> {
    let mesh = Mesh {
        vertices: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ],
        normals: None,
        faces: vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
    };
    mesh::serialize(&mesh, MeshFormat::Stl).expect("tetrahedron serializes")
}

/// Services wired to a temp blob directory and the in-memory repository.
pub struct Harness {
    dir: TempDir,
    pub blobs: Arc<dyn BlobStore>,
    pub assets: Arc<AssetLifecycleManager>,
    pub conversions: ConversionEngine,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_policy(ConversionPolicy::default()).await
    }

    pub async fn with_policy(policy: ConversionPolicy) -> Self {
        Self::with_store(policy, |store| Arc::new(store) as Arc<dyn BlobStore>).await
    }

    /// Like [`with_policy`](Self::with_policy), with the filesystem store
    /// wrapped by `wrap` before it is handed to the services.
    pub async fn with_store<F>(policy: ConversionPolicy, wrap: F) -> Self
    where
        F: FnOnce(FilesystemBlobStore) -> Arc<dyn BlobStore>,
    {
        let dir = TempDir::new().unwrap();
        let store = FilesystemBlobStore::new(dir.path().join("blobs"), MAX_UPLOAD)
            .await
            .unwrap();
        let blobs = wrap(store);
        let assets = Arc::new(AssetLifecycleManager::new(
            Arc::new(MemoryAssetRepository::new()),
            blobs.clone(),
            UploadPolicy::new(MAX_UPLOAD),
        ));
        let conversions = ConversionEngine::new(assets.clone(), blobs.clone(), policy);

        Self {
            dir,
            blobs,
            assets,
            conversions,
        }
    }

    pub fn upload(&self, filename: &str, bytes: Vec<u8>) -> Upload {
        Upload {
            filename: filename.into(),
            bytes,
            ..Default::default()
        }
    }

    pub async fn ingest(&self, filename: &str, bytes: Vec<u8>, user: &str) -> ModelAsset {
        self.assets
            .ingest(self.upload(filename, bytes), user)
            .await
            .unwrap()
    }

    /// Number of stored blobs, ignoring the temp directory.
    pub fn blob_count(&self) -> usize {
        count_files(&self.dir.path().join("blobs"))
    }
}

/// Delegates to a filesystem store, but stalls after each completed `put`.
pub struct SlowPutStore {
    pub inner: FilesystemBlobStore,
    pub delay: Duration,
}

#[async_trait]
impl BlobStore for SlowPutStore {
    async fn put(&self, name: &str, data: &[u8]) -> Result<BlobRef, StorageError> {
        let blob = self.inner.put(name, data).await?;
        tokio::time::sleep(self.delay).await;
        Ok(blob)
    }

    async fn put_stream(&self, name: &str, reader: BoxReader) -> Result<BlobRef, StorageError> {
        self.inner.put_stream(name, reader).await
    }

    async fn get_stream(&self, blob: &BlobRef) -> Result<BoxReader, StorageError> {
        self.inner.get_stream(blob).await
    }

    async fn exists(&self, blob: &BlobRef) -> Result<bool, StorageError> {
        self.inner.exists(blob).await
    }

    async fn delete(&self, blob: &BlobRef) -> Result<bool, StorageError> {
        self.inner.delete(blob).await
    }

    async fn size(&self, blob: &BlobRef) -> Result<u64, StorageError> {
        self.inner.size(blob).await
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .count()
}
