//! Display normalization: center, canonical orientation, uniform scale.

use serde::Serialize;

use crate::mesh::{Mesh, Normals};

/// Edge length of the cube the largest mesh dimension is scaled to.
pub const TARGET_SIZE: f32 = 2.0;

/// Canonical orientation: a rotation of π about X followed by π/2 about Y,
/// written out exactly so no sin/cos rounding leaks into the vertices.
///
/// Maps `(x, y, z)` to `(-z, -y, -x)`.
pub const CANONICAL_ROTATION: [[f32; 3]; 3] = [
    [0.0, 0.0, -1.0],
    [0.0, -1.0, 0.0],
    [-1.0, 0.0, 0.0],
];

/// What [`normalize`] did to the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Normalization {
    /// Bounding-box center that was moved to the origin.
    pub center: [f32; 3],
    /// Uniform scale factor applied after rotation; 1 for degenerate meshes.
    pub scale: f32,
}

fn rotate(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Normalize a freshly parsed mesh for display.
///
/// Translates the bounding-box center to the origin, applies
/// [`CANONICAL_ROTATION`] to vertices and normals, then scales so the largest
/// box dimension equals [`TARGET_SIZE`]. A zero largest dimension (a point
/// mesh) leaves the scale at 1. The rotation compounds, so apply this exactly
/// once per load regardless of the source format.
pub fn normalize(mesh: &mut Mesh) -> Normalization {
    let Some(bounds) = mesh.bounds() else {
        return Normalization {
            center: [0.0; 3],
            scale: 1.0,
        };
    };

    let center = bounds.center();
    for v in &mut mesh.vertices {
        let centered = [v[0] - center[0], v[1] - center[1], v[2] - center[2]];
        *v = rotate(&CANONICAL_ROTATION, centered);
    }
    match &mut mesh.normals {
        Some(Normals::PerVertex(normals)) | Some(Normals::PerFace(normals)) => {
            for n in normals.iter_mut() {
                *n = rotate(&CANONICAL_ROTATION, *n);
            }
        }
        None => {}
    }

    let max_dim = mesh
        .bounds()
        .map(|b| b.max_dimension())
        .unwrap_or_default();
    let scale = if max_dim > 0.0 && max_dim.is_finite() {
        TARGET_SIZE / max_dim
    } else {
        1.0
    };

    if scale != 1.0 {
        for v in &mut mesh.vertices {
            for c in v.iter_mut() {
                *c *= scale;
            }
        }
    }

    Normalization { center, scale }
}
