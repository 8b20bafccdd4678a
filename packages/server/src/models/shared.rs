/// Escape LIKE wildcard characters in a search string.
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Longest accepted model name, in characters.
pub const MAX_NAME_CHARS: usize = 256;
/// Longest accepted description, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 10_000;

/// Trim and validate a model name (1-256 Unicode characters).
pub fn normalize_name(name: &str) -> Result<String, &'static str> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err("Name must be 1-256 characters");
    }
    Ok(name.to_string())
}

pub fn normalize_description(description: &str) -> Result<String, &'static str> {
    let description = description.trim();
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err("Description must be at most 10000 characters");
    }
    Ok(description.to_string())
}
