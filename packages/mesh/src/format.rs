use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MeshError;

/// Mesh file format tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeshFormat {
    Stl,
    Obj,
    Other,
}

impl MeshFormat {
    /// Classify a filename by its lowercased extension. Never fails.
    pub fn detect(filename: &str) -> Self {
        match filename.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Self::Other,
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "stl" => Self::Stl,
            "obj" => Self::Obj,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stl => "STL",
            Self::Obj => "OBJ",
            Self::Other => "OTHER",
        }
    }

    /// File extension used when writing this format, if it has a codec.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Stl => Some("stl"),
            Self::Obj => Some("obj"),
            Self::Other => None,
        }
    }

    /// Whether the codec can parse and serialize this format.
    pub fn is_mesh(&self) -> bool {
        self.extension().is_some()
    }

    /// MIME type advertised when serving a file of this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Stl => "model/stl",
            Self::Obj => "model/obj",
            Self::Other => "application/octet-stream",
        }
    }
}

impl fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeshFormat {
    type Err = MeshError;

    /// Case-insensitive parse of `STL`, `OBJ` or `OTHER`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STL" => Ok(Self::Stl),
            "OBJ" => Ok(Self::Obj),
            "OTHER" => Ok(Self::Other),
            _ => Err(MeshError::UnknownFormat(s.to_string())),
        }
    }
}
