//! Parsing and serialization between bytes and the canonical [`Mesh`].

pub mod obj;
pub mod stl;

use crate::error::MeshError;
use crate::format::MeshFormat;
use crate::mesh::Mesh;

/// Parse `bytes` as `format` into a canonical mesh.
pub fn parse(bytes: &[u8], format: MeshFormat) -> Result<Mesh, MeshError> {
    match format {
        MeshFormat::Stl => stl::parse(bytes),
        MeshFormat::Obj => obj::parse(bytes),
        MeshFormat::Other => Err(MeshError::UnsupportedFormat(format)),
    }
}

/// Serialize a canonical mesh into `format`.
pub fn serialize(mesh: &Mesh, format: MeshFormat) -> Result<Vec<u8>, MeshError> {
    mesh.validate()?;
    match format {
        MeshFormat::Stl => stl::serialize(mesh),
        MeshFormat::Obj => Ok(obj::serialize(mesh)),
        MeshFormat::Other => Err(MeshError::UnsupportedFormat(format)),
    }
}
