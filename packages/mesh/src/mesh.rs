//! Canonical in-memory mesh shared by every codec.

use serde::Serialize;

use crate::error::MeshError;

/// Optional normal buffer attached to a mesh.
#[derive(Debug, Clone, PartialEq)]
pub enum Normals {
    /// One normal per vertex, parallel to [`Mesh::vertices`].
    PerVertex(Vec<[f32; 3]>),
    /// One normal per face, parallel to [`Mesh::faces`].
    PerFace(Vec<[f32; 3]>),
}

/// Format-independent triangle mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f32; 3]>,
    pub normals: Option<Normals>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertices: usize, faces: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            normals: None,
            faces: Vec::with_capacity(faces),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Axis-aligned bounding box of all vertices, `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_points(&self.vertices)
    }

    /// Check that every face index refers to an existing vertex and that the
    /// normal buffer, if any, has the right length.
    pub fn validate(&self) -> Result<(), MeshError> {
        let count = self.vertices.len();
        for (i, face) in self.faces.iter().enumerate() {
            if let Some(&idx) = face.iter().find(|&&idx| idx as usize >= count) {
                return Err(MeshError::InvalidMesh(format!(
                    "face {i} references vertex {idx}, mesh has {count} vertices"
                )));
            }
        }
        match &self.normals {
            Some(Normals::PerVertex(n)) if n.len() != count => Err(MeshError::InvalidMesh(
                format!("{} vertex normals for {count} vertices", n.len()),
            )),
            Some(Normals::PerFace(n)) if n.len() != self.faces.len() => {
                Err(MeshError::InvalidMesh(format!(
                    "{} face normals for {} faces",
                    n.len(),
                    self.faces.len()
                )))
            }
            _ => Ok(()),
        }
    }

    /// Flat normal of a face from its winding order. Degenerate faces yield
    /// the zero vector.
    pub fn face_normal(&self, face: usize) -> [f32; 3] {
        let [a, b, c] = self.faces[face];
        let (a, b, c) = (
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        );
        normalize_or_zero(cross(sub(b, a), sub(c, a)))
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    pub fn from_points(points: &[[f32; 3]]) -> Option<Self> {
        let first = *points.first()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for p in &points[1..] {
            for axis in 0..3 {
                bounds.min[axis] = bounds.min[axis].min(p[axis]);
                bounds.max[axis] = bounds.max[axis].max(p[axis]);
            }
        }
        Some(bounds)
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    pub fn size(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn max_dimension(&self) -> f32 {
        let [x, y, z] = self.size();
        x.max(y).max(z)
    }
}

pub(crate) fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn normalize_or_zero(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len > f32::EPSILON && len.is_finite() {
        [v[0] / len, v[1] / len, v[2] / len]
    } else {
        [0.0, 0.0, 0.0]
    }
}
