/// Why a client-supplied filename was refused.
#[derive(Debug, PartialEq, Eq)]
pub enum FilenameError {
    Empty,
    NullByte,
    /// Contains CR, LF or another control character.
    ControlCharacter,
    /// `.`, `..` or a dotfile.
    Hidden,
    TooLong,
}

impl FilenameError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Filename cannot be empty",
            Self::NullByte => "Invalid filename: null bytes are not allowed",
            Self::ControlCharacter => "Invalid filename: control characters are not allowed",
            Self::Hidden => "Invalid filename: hidden files (starting with '.') are not allowed",
            Self::TooLong => "Invalid filename: longer than 255 bytes",
        }
    }
}

/// Reduce a multipart filename to a safe base name.
///
/// Some clients send a full local path, so anything before the last `/` or
/// `\` is dropped rather than rejected.
pub fn client_filename(raw: &str) -> Result<String, FilenameError> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();

    if base.is_empty() {
        return Err(FilenameError::Empty);
    }
    if base.contains('\0') {
        return Err(FilenameError::NullByte);
    }
    // CRLF would otherwise end up in Content-Disposition on download.
    if base.chars().any(|c| c.is_control()) {
        return Err(FilenameError::ControlCharacter);
    }
    if base.starts_with('.') {
        return Err(FilenameError::Hidden);
    }
    if base.len() > 255 {
        return Err(FilenameError::TooLong);
    }
    Ok(base.to_string())
}

/// Replace the extension of `filename`, or append one if it has none.
pub fn swap_extension(filename: &str, extension: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.{extension}"),
        _ => format!("{filename}.{extension}"),
    }
}

/// Build a safe `Content-Disposition` header value.
pub fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "model".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("attachment; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}
