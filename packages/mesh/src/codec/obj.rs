//! Wavefront OBJ codec (geometry only).
//!
//! Only `v` and `f` statements carry data for this pipeline. Face corners may
//! be written as `v`, `v/vt`, `v//vn` or `v/vt/vn`; only the vertex index is
//! kept. Polygons are fan-triangulated. Everything else is ignored.

use std::fmt::Write;

use crate::error::MeshError;
use crate::format::MeshFormat;
use crate::mesh::Mesh;

fn malformed(line_no: usize, message: impl std::fmt::Display) -> MeshError {
    MeshError::malformed(MeshFormat::Obj, format!("line {line_no}: {message}"))
}

/// Parse OBJ text.
pub fn parse(bytes: &[u8]) -> Result<Mesh, MeshError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| MeshError::malformed(MeshFormat::Obj, format!("not UTF-8: {e}")))?;

    let mut mesh = Mesh::new();
    // Positive indices may point forward, so range checks run after parsing.
    let mut pending: Vec<(usize, [i64; 3])> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = match raw.split_once('#') {
            Some((content, _)) => content,
            None => raw,
        };
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        match keyword {
            "v" => {
                let coords: Vec<&str> = tokens.take(3).collect();
                if coords.len() < 3 {
                    return Err(malformed(line_no, "vertex needs 3 coordinates"));
                }
                let mut vertex = [0.0f32; 3];
                for (slot, token) in vertex.iter_mut().zip(&coords) {
                    *slot = token
                        .parse::<f32>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| malformed(line_no, format!("invalid number '{token}'")))?;
                }
                mesh.vertices.push(vertex);
            }
            "f" => {
                let corners = tokens
                    .map(|corner| parse_corner(corner, mesh.vertices.len(), line_no))
                    .collect::<Result<Vec<_>, _>>()?;
                if corners.len() < 3 {
                    return Err(malformed(
                        line_no,
                        format!("face has {} corners, expected at least 3", corners.len()),
                    ));
                }
                for i in 1..corners.len() - 1 {
                    pending.push((line_no, [corners[0], corners[i], corners[i + 1]]));
                }
            }
            _ => {}
        }
    }

    let count = mesh.vertices.len() as i64;
    mesh.faces.reserve(pending.len());
    for (line_no, corners) in pending {
        let mut face = [0u32; 3];
        for (slot, &index) in face.iter_mut().zip(&corners) {
            if index < 0 || index >= count {
                return Err(malformed(
                    line_no,
                    format!("vertex index {} out of range (1..={count})", index + 1),
                ));
            }
            *slot = u32::try_from(index).map_err(|_| malformed(line_no, "index too large"))?;
        }
        mesh.faces.push(face);
    }

    Ok(mesh)
}

/// Resolve one face corner to a 0-based vertex index. Negative indices count
/// back from the vertices defined so far.
fn parse_corner(corner: &str, defined: usize, line_no: usize) -> Result<i64, MeshError> {
    let vertex = corner.split('/').next().unwrap_or_default();
    let index: i64 = vertex
        .parse()
        .map_err(|_| malformed(line_no, format!("invalid face index '{corner}'")))?;
    match index {
        0 => Err(malformed(line_no, "face index 0 is not valid")),
        i if i > 0 => Ok(i - 1),
        i => Ok(defined as i64 + i),
    }
}

/// Serialize vertex lines then face lines with 1-based indices.
pub fn serialize(mesh: &Mesh) -> Vec<u8> {
    let mut out = String::with_capacity(mesh.vertices.len() * 32 + mesh.faces.len() * 24);
    let _ = writeln!(out, "# exported by meshdepot");
    let _ = writeln!(
        out,
        "# {} vertices, {} faces",
        mesh.vertices.len(),
        mesh.faces.len()
    );
    for [x, y, z] in &mesh.vertices {
        let _ = writeln!(out, "v {x} {y} {z}");
    }
    for [a, b, c] in &mesh.faces {
        let _ = writeln!(out, "f {} {} {}", a + 1, b + 1, c + 1);
    }
    out.into_bytes()
}
