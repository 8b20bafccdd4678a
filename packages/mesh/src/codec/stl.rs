//! STL (stereolithography) codec.
//!
//! Binary layout:
//!
//! ```text
//! UINT8[80]    header, no meaning
//! UINT32       triangle count (little endian)
//! foreach triangle
//!     REAL32[3] normal
//!     REAL32[3] vertex 1
//!     REAL32[3] vertex 2
//!     REAL32[3] vertex 3
//!     UINT16    attribute byte count, ignored
//! end
//! ```
//!
//! Input whose size does not match the binary layout but starts with `solid`
//! is read as ASCII STL. Output is always binary.

use crate::error::MeshError;
use crate::format::MeshFormat;
use crate::mesh::{Mesh, Normals, normalize_or_zero};

/// STL binary header size in bytes.
pub const HEADER_SIZE: usize = 80;

/// Header plus the triangle count.
pub const PREAMBLE_SIZE: usize = HEADER_SIZE + 4;

/// Size of one triangle record (normal + 3 vertices + attribute).
pub const TRIANGLE_SIZE: usize = 50;

const EXPORT_HEADER: &[u8] = b"binary STL exported by meshdepot";

fn malformed(message: impl Into<String>) -> MeshError {
    MeshError::malformed(MeshFormat::Stl, message)
}

/// Triangle count declared in the binary preamble, if there is one.
fn declared_triangles(bytes: &[u8]) -> Option<u32> {
    let raw = bytes.get(HEADER_SIZE..PREAMBLE_SIZE)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn binary_len(triangles: u32) -> u64 {
    u64::from(triangles) * TRIANGLE_SIZE as u64 + PREAMBLE_SIZE as u64
}

fn looks_ascii(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"solid")
}

/// Parse binary (or ASCII) STL bytes.
pub fn parse(bytes: &[u8]) -> Result<Mesh, MeshError> {
    let declared = declared_triangles(bytes);
    if let Some(count) = declared
        && binary_len(count) == bytes.len() as u64
    {
        return parse_binary(bytes, count);
    }

    if looks_ascii(bytes) {
        return parse_ascii(bytes);
    }

    match declared {
        Some(count) => Err(malformed(format!(
            "header declares {count} triangles ({} bytes) but input is {} bytes",
            binary_len(count),
            bytes.len()
        ))),
        None => Err(malformed(format!(
            "input is {} bytes, shorter than the {PREAMBLE_SIZE}-byte preamble",
            bytes.len()
        ))),
    }
}

fn read_vec3(buf: &[u8]) -> [f32; 3] {
    let f = |i: usize| f32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
    [f(0), f(4), f(8)]
}

/// Caller guarantees `bytes.len() == binary_len(count)`.
fn parse_binary(bytes: &[u8], count: u32) -> Result<Mesh, MeshError> {
    let count = count as usize;
    let mut mesh = Mesh::with_capacity(count * 3, count);
    let mut normals = Vec::with_capacity(count);

    for (i, record) in bytes[PREAMBLE_SIZE..].chunks_exact(TRIANGLE_SIZE).enumerate() {
        normals.push(read_vec3(&record[0..12]));
        if let Some(corner) = [12, 24, 36]
            .into_iter()
            .find(|&at| !read_vec3(&record[at..at + 12]).iter().all(|c| c.is_finite()))
        {
            return Err(malformed(format!(
                "triangle {i}: non-finite coordinate at byte {}",
                PREAMBLE_SIZE + i * TRIANGLE_SIZE + corner
            )));
        }

        #[allow(clippy::cast_possible_truncation)]
        // The count is a u32, so vertex indices fit.
        let base = mesh.vertices.len() as u32;
        mesh.vertices.push(read_vec3(&record[12..24]));
        mesh.vertices.push(read_vec3(&record[24..36]));
        mesh.vertices.push(read_vec3(&record[36..48]));
        mesh.faces.push([base, base + 1, base + 2]);
    }

    mesh.normals = Some(Normals::PerFace(normals));
    Ok(mesh)
}

fn parse_floats(tokens: &[&str], line_no: usize) -> Result<[f32; 3], MeshError> {
    if tokens.len() < 3 {
        return Err(malformed(format!("line {line_no}: expected 3 coordinates")));
    }
    let mut out = [0.0f32; 3];
    for (slot, token) in out.iter_mut().zip(tokens) {
        *slot = token
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| malformed(format!("line {line_no}: invalid number '{token}'")))?;
    }
    Ok(out)
}

fn parse_ascii(bytes: &[u8]) -> Result<Mesh, MeshError> {
    let text = std::str::from_utf8(bytes).map_err(|e| malformed(format!("not UTF-8: {e}")))?;

    let mut mesh = Mesh::new();
    let mut normals = Vec::new();
    let mut facet: Option<([f32; 3], Vec<[f32; 3]>)> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((&keyword, rest)) = tokens.split_first() else {
            continue;
        };

        match keyword {
            "facet" => {
                if facet.is_some() {
                    return Err(malformed(format!("line {line_no}: nested facet")));
                }
                let normal = match rest.split_first() {
                    Some((&"normal", coords)) => parse_floats(coords, line_no)?,
                    _ => [0.0; 3],
                };
                facet = Some((normal, Vec::with_capacity(3)));
            }
            "vertex" => {
                let Some((_, corners)) = facet.as_mut() else {
                    return Err(malformed(format!("line {line_no}: vertex outside facet")));
                };
                corners.push(parse_floats(rest, line_no)?);
            }
            "endfacet" => {
                let Some((normal, corners)) = facet.take() else {
                    return Err(malformed(format!("line {line_no}: endfacet without facet")));
                };
                if corners.len() != 3 {
                    return Err(malformed(format!(
                        "line {line_no}: facet has {} vertices, expected 3",
                        corners.len()
                    )));
                }
                let base = u32::try_from(mesh.vertices.len())
                    .map_err(|_| malformed("too many vertices"))?;
                mesh.vertices.extend(corners);
                mesh.faces.push([base, base + 1, base + 2]);
                normals.push(normal);
            }
            // solid, outer loop, endloop, endsolid carry no geometry.
            _ => {}
        }
    }

    if facet.is_some() {
        return Err(malformed("unterminated facet at end of input"));
    }

    mesh.normals = Some(Normals::PerFace(normals));
    Ok(mesh)
}

/// Normal for face `i`, taken from the mesh's buffer when available.
fn face_normal(mesh: &Mesh, i: usize) -> [f32; 3] {
    match &mesh.normals {
        Some(Normals::PerFace(n)) => n[i],
        Some(Normals::PerVertex(n)) => {
            let [a, b, c] = mesh.faces[i];
            let (a, b, c) = (n[a as usize], n[b as usize], n[c as usize]);
            normalize_or_zero([a[0] + b[0] + c[0], a[1] + b[1] + c[1], a[2] + b[2] + c[2]])
        }
        None => mesh.face_normal(i),
    }
}

/// Serialize to binary STL. The mesh must already be validated.
pub fn serialize(mesh: &Mesh) -> Result<Vec<u8>, MeshError> {
    let count = u32::try_from(mesh.faces.len()).map_err(|_| {
        MeshError::InvalidMesh(format!("{} faces exceed the STL limit", mesh.faces.len()))
    })?;

    let mut out = Vec::with_capacity(PREAMBLE_SIZE + mesh.faces.len() * TRIANGLE_SIZE);
    let mut header = [0u8; HEADER_SIZE];
    header[..EXPORT_HEADER.len()].copy_from_slice(EXPORT_HEADER);
    out.extend_from_slice(&header);
    out.extend_from_slice(&count.to_le_bytes());

    for (i, face) in mesh.faces.iter().enumerate() {
        let normal = face_normal(mesh, i);
        for value in normal {
            out.extend_from_slice(&value.to_le_bytes());
        }
        for &idx in face {
            for value in mesh.vertices[idx as usize] {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }

    Ok(out)
}
