use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

/// Where asset records live.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    /// Process-local records, lost on restart. For tests and demos.
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding every blob (originals, thumbnails, artifacts).
    pub blob_dir: PathBuf,
    /// Prefix that turns a blob ref into a public URL, e.g. `/uploads`.
    pub public_prefix: String,
    /// Largest accepted upload in bytes.
    pub max_upload_size: u64,
    /// Largest blob the store accepts. Converted OBJ text can be several
    /// times the size of the binary STL it came from.
    pub max_blob_size: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversionConfig {
    /// OBJ to STL is off until it has been validated on real-world files.
    pub allow_obj_to_stl: bool,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub conversion: ConversionConfig,
}

pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 200 * 1024 * 1024;
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 1024 * 1024 * 1024;

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", vec!["http://localhost:5173"])?
            .set_default("server.cors.max_age", 3600)?
            .set_default("database.backend", "postgres")?
            .set_default("storage.blob_dir", "./uploads")?
            .set_default("storage.public_prefix", "/uploads")?
            .set_default("storage.max_upload_size", DEFAULT_MAX_UPLOAD_SIZE as i64)?
            .set_default("storage.max_blob_size", DEFAULT_MAX_BLOB_SIZE as i64)?
            .set_default("conversion.allow_obj_to_stl", false)?
            .set_default("conversion.timeout_secs", 120)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., MESHDEPOT__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("MESHDEPOT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
