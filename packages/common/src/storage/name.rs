use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::error::StorageError;

const MAX_NAME_LEN: usize = 255;

/// A validated reference to a blob in the flat storage namespace.
///
/// The reference is the blob's name. Public URLs are built by prefix
/// concatenation, see [`BlobRef::public_url`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BlobRef(String);

impl BlobRef {
    /// Parse and validate a flat blob name.
    pub fn parse(name: &str) -> Result<Self, StorageError> {
        if name.is_empty() {
            return Err(StorageError::InvalidName("name cannot be empty".into()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(StorageError::InvalidName(format!(
                "name exceeds {MAX_NAME_LEN} bytes"
            )));
        }
        if name.chars().any(|c| c.is_control()) {
            return Err(StorageError::InvalidName(
                "control characters are not allowed".into(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(StorageError::InvalidName(
                "path separators are not allowed".into(),
            ));
        }
        if name.starts_with('.') {
            return Err(StorageError::InvalidName(
                "names starting with '.' are not allowed".into(),
            ));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Join the reference onto a public prefix such as `/uploads`.
    pub fn public_url(&self, prefix: &str) -> String {
        format!("{}/{}", prefix.trim_end_matches('/'), self.0)
    }
}

impl fmt::Debug for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobRef({})", self.0)
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlobRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for BlobRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BlobRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Last issued timestamp, so names stay unique within the process even when
/// the clock does not advance between calls.
static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

fn next_stamp() -> i64 {
    let now = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros() * 1000);
    let mut last = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_STAMP.compare_exchange_weak(last, candidate, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// Reduce an arbitrary upload filename to characters safe for a flat name.
///
/// Whitespace runs become `-`, anything outside `[A-Za-z0-9._-]` becomes `_`,
/// and leading dots are dropped.
fn sanitize(original: &str) -> String {
    let mut out = String::with_capacity(original.len());
    let mut in_space = false;
    for c in original.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    let trimmed = out.trim_start_matches('.');
    let mut name: String = if trimmed.is_empty() {
        "blob".to_string()
    } else {
        trimmed.to_string()
    };
    // Leave room for the timestamp prefix.
    if name.len() > 200 {
        let cut = name.len() - 200;
        name.drain(..cut);
    }
    name
}

/// Generate a unique blob name: `{nanosecond timestamp}-{sanitized original}`.
pub fn unique_blob_name(original: &str) -> String {
    format!("{}-{}", next_stamp(), sanitize(original))
}

/// Generate a unique blob name for a file derived from `original`, swapping
/// its extension for `extension` (e.g. `part.stl` -> `{ts}-part.obj`).
pub fn derived_blob_name(original: &str, extension: &str) -> String {
    let stem = match original.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => original,
    };
    unique_blob_name(&format!("{stem}.{extension}"))
}
