pub mod conversion_artifact;
pub mod model_asset;
