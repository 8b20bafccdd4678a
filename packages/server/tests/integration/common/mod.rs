pub mod postgres;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use common::storage::{BlobStore, FilesystemBlobStore};
use mesh::{Mesh, MeshFormat};
use reqwest::Client;
use serde_json::Value;
use tempfile::TempDir;

use meshdepot_server::config::{
    AppConfig, AuthConfig, ConversionConfig, CorsConfig, DatabaseBackend, DatabaseConfig,
    ServerConfig, StorageConfig,
};
use meshdepot_server::repository::MemoryAssetRepository;
use meshdepot_server::state::AppState;
use meshdepot_server::utils::jwt;

const JWT_SECRET: &str = "test-secret-for-integration-tests";

/// Upload limit for tests, small enough to exceed cheaply.
pub const MAX_UPLOAD_SIZE: u64 = 64 * 1024;

pub mod routes {
    use uuid::Uuid;

    pub const MODELS: &str = "/api/v1/models";

    pub fn model(id: &str) -> String {
        format!("/api/v1/models/{id}")
    }

    pub fn convert(id: &str) -> String {
        format!("/api/v1/models/{id}/convert")
    }

    pub fn view(id: &str) -> String {
        format!("/api/v1/models/{id}/view")
    }

    pub fn download(id: &str) -> String {
        format!("/api/v1/models/{id}/download")
    }

    pub fn download_file(id: &str) -> String {
        format!("/api/v1/models/{id}/download-file")
    }

    pub fn geometry(id: &str) -> String {
        format!("/api/v1/models/{id}/geometry")
    }

    pub fn default_view(id: &str) -> String {
        format!("/api/v1/models/{id}/defaultView")
    }

    pub fn user_models(user_id: &str) -> String {
        format!("/api/v1/models/user/{user_id}")
    }

    pub fn missing_model() -> String {
        model(&Uuid::now_v7().to_string())
    }
}

/// Binary STL of a unit tetrahedron (4 facets).
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
    mesh::serialize(&mesh, MeshFormat::Stl).unwrap()
}

pub const OBJ_QUAD: &str = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";

/// A running test server backed by the in-memory repository.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    blob_root: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(false).await
    }

    pub async fn spawn_with(allow_obj_to_stl: bool) -> Self {
        let blob_root = TempDir::new().expect("Failed to create blob directory");
        let blob_dir = blob_root.path().join("uploads");

        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
            },
            database: DatabaseConfig {
                backend: DatabaseBackend::Memory,
                url: String::new(),
            },
            storage: StorageConfig {
                blob_dir: blob_dir.clone(),
                public_prefix: "/uploads".to_string(),
                max_upload_size: MAX_UPLOAD_SIZE,
                max_blob_size: 4 * MAX_UPLOAD_SIZE,
            },
            auth: AuthConfig {
                jwt_secret: JWT_SECRET.to_string(),
            },
            conversion: ConversionConfig {
                allow_obj_to_stl,
                timeout_secs: 30,
            },
        };

        let store = FilesystemBlobStore::new(blob_dir, app_config.storage.max_blob_size)
            .await
            .expect("Failed to initialize blob store");
        let blobs: Arc<dyn BlobStore> = Arc::new(store);
        let state = AppState::new(app_config, Arc::new(MemoryAssetRepository::new()), blobs);

        let app = meshdepot_server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            blob_root,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn token_for(&self, user_id: &str) -> String {
        jwt::sign(user_id, JWT_SECRET, Duration::hours(1)).expect("Failed to sign token")
    }

    /// Files currently stored in the blob directory.
    pub fn stored_blobs(&self) -> Vec<String> {
        let dir: PathBuf = self.blob_root.path().join("uploads");
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("Failed to read blob directory")
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self.get_raw(path, Some(token)).await;
        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self.get_raw(path, None).await;
        TestResponse::from_response(res).await
    }

    /// Unparsed GET, for asserting on headers and binary bodies.
    pub async fn get_raw(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req.send().await.expect("Failed to send GET request")
    }

    pub async fn put_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PUT request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    /// Multipart upload with `modelFile` plus optional text fields.
    pub async fn upload_model(
        &self,
        file_name: &str,
        file_bytes: Vec<u8>,
        fields: &[(&str, &str)],
        token: Option<&str>,
    ) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .expect("Failed to set MIME type");
        let mut form = reqwest::multipart::Form::new().part("modelFile", part);
        for (name, value) in fields {
            form = form.text(name.to_string(), value.to_string());
        }

        let mut req = self.client.post(self.url(routes::MODELS)).multipart(form);
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        let res = req
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Upload a file as `user` and return the new model's id.
    pub async fn create_model(&self, user: &str, file_name: &str, bytes: Vec<u8>) -> String {
        let token = self.token_for(user);
        let res = self.upload_model(file_name, bytes, &[], Some(&token)).await;
        assert_eq!(res.status, 201, "Upload failed: {}", res.text);
        res.id()
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    pub fn id(&self) -> String {
        self.body["id"]
            .as_str()
            .expect("response body should contain 'id'")
            .to_string()
    }

    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}
