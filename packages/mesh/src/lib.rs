//! Mesh ingestion pipeline: format detection, STL/OBJ codec, geometry
//! normalization and placeholder thumbnails.

pub mod codec;
pub mod error;
pub mod format;
pub mod mesh;
pub mod normalize;
pub mod thumbnail;

pub use codec::{parse, serialize};
pub use error::MeshError;
pub use format::MeshFormat;
pub use mesh::{Bounds, Mesh, Normals};
pub use normalize::{Normalization, normalize};
