//! File name derivation and sanitization for staged artifacts.
//!
//! Names come from three places, in order of trust: the platform listing,
//! a `Content-Disposition` header, and the last path segment of the URL.

use std::path::{Component, Path};

use url::Url;

/// Name used when no other source yields a usable file name.
pub const FALLBACK_FILE_NAME: &str = "download";

/// Longest file name (in bytes) written to the staging area.
const MAX_FILE_NAME_BYTES: usize = 200;

/// Parses a `Content-Disposition` header value and returns the file name.
///
/// Handles:
/// - `attachment; filename="example.mp4"`
/// - `attachment; filename=example.mp4`
/// - `attachment; filename*=UTF-8''example%20clip.mp4` (RFC 5987, preferred)
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded = encoded[..end].trim().trim_matches('"');
            if let Ok(decoded) = urlencoding::decode(encoded)
                && !decoded.trim().is_empty()
            {
                return Some(decoded.into_owned());
            }
        }
    }

    let pos = header.find("filename=")?;
    let value = header[pos + 9..].trim();
    if let Some(stripped) = value.strip_prefix('"') {
        let end = stripped.find('"')?;
        let name = &stripped[..end];
        return (!name.trim().is_empty()).then(|| name.to_string());
    }

    let end = value.find(';').unwrap_or(value.len());
    let name = value[..end].trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Returns the percent-decoded last path segment of `url`, if non-empty.
#[must_use]
pub fn name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    (!decoded.trim().is_empty()).then_some(decoded)
}

/// Makes `name` safe to use as a single path component.
///
/// Replaces `/ \ : * ? " < > |` and control characters with `_`, neutralizes
/// `.`/`..`, and truncates on a character boundary.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return FALLBACK_FILE_NAME.to_string();
    }

    let sanitized = if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    };

    truncate_on_char_boundary(sanitized, MAX_FILE_NAME_BYTES)
}

fn truncate_on_char_boundary(mut value: String, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes;
    while !value.is_char_boundary(cut) {
        cut -= 1;
    }
    value.truncate(cut);
    value
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
