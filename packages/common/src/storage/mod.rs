mod error;
mod name;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use filesystem::FilesystemBlobStore;
pub use name::{BlobRef, derived_blob_name, unique_blob_name};
pub use traits::{BlobStore, BoxReader};
