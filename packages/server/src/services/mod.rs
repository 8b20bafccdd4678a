//! Asset lifecycle and conversion services.

mod conversion;
mod error;
mod lifecycle;
mod upload;

#[cfg(test)]
pub(crate) mod test_support;

pub use conversion::{ConversionEngine, ConversionOutcome, ConversionPolicy};
pub use error::AssetError;
pub use lifecycle::{AssetLifecycleManager, ModelFile, Upload, ViewerGeometry};
pub use upload::UploadPolicy;
