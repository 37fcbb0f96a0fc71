//! Netscape cookie export parser and reqwest jar loader.
//!
//! Each data line holds TAB-separated fields:
//! `domain  include_subdomains  path  secure  expires  name  value`.
//! Only the name (field 5) and value (field 6) are required to be present;
//! the other fields are used when well-formed and defaulted otherwise.
//! Lines starting with `#` are skipped, which also drops `#HttpOnly_` entries.

use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::cookie::Jar;
use tracing::{debug, instrument, warn};
use url::Url;

const NAME_FIELD: usize = 5;
const VALUE_FIELD: usize = 6;

/// One cookie from the export.
///
/// The value is redacted in `Debug` output; session cookies are credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie domain as written in the export (may start with `.`).
    pub domain: String,
    /// Path scope.
    pub path: String,
    /// Whether the cookie is HTTPS-only.
    pub secure: bool,
    /// Unix expiry timestamp, 0 for session cookies.
    pub expires: u64,
    /// Cookie name.
    pub name: String,
    value: String,
}

impl SessionCookie {
    /// Returns the cookie value. Never log it.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// True when the cookie carries an expiry that is already in the past.
    #[must_use]
    pub fn is_expired_at(&self, now_unix: u64) -> bool {
        self.expires != 0 && self.expires < now_unix
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Errors loading a cookie export.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// I/O error reading the export.
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// The export had data lines but none yielded a cookie.
    #[error(
        "no usable cookies in cookie file ({skipped} lines skipped)\n  Suggestion: Re-export cookies from a browser logged in to TeraBox"
    )]
    NoCookiesFound {
        /// Number of data lines that could not be parsed.
        skipped: usize,
    },
}

/// Parsed cookie export.
#[derive(Debug, Clone, Default)]
pub struct CookieFile {
    /// Successfully parsed cookies, in file order.
    pub cookies: Vec<SessionCookie>,
    /// Line numbers (1-based) of data lines that had too few fields.
    pub skipped_lines: Vec<usize>,
}

/// Parses a Netscape-format cookie export.
///
/// # Errors
///
/// Returns [`CookieError::Io`] on read failure and
/// [`CookieError::NoCookiesFound`] when data lines exist but none parse.
#[instrument(level = "debug", skip(reader))]
pub fn parse_netscape_cookies(reader: impl BufRead) -> Result<CookieFile, CookieError> {
    let mut parsed = CookieFile::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_cookie_line(line) {
            Some(cookie) => {
                debug!(line = idx + 1, domain = %cookie.domain, name = %cookie.name, "parsed cookie");
                parsed.cookies.push(cookie);
            }
            None => {
                warn!(line = idx + 1, "skipping cookie line with fewer than 7 fields");
                parsed.skipped_lines.push(idx + 1);
            }
        }
    }

    if parsed.cookies.is_empty() && !parsed.skipped_lines.is_empty() {
        return Err(CookieError::NoCookiesFound {
            skipped: parsed.skipped_lines.len(),
        });
    }
    Ok(parsed)
}

/// Reads and parses a cookie export from disk.
///
/// # Errors
///
/// Same as [`parse_netscape_cookies`], plus I/O errors opening the file.
pub fn load_cookie_file(path: &Path) -> Result<CookieFile, CookieError> {
    let file = std::fs::File::open(path)?;
    let parsed = parse_netscape_cookies(std::io::BufReader::new(file))?;
    debug!(
        path = %path.display(),
        cookies = parsed.cookies.len(),
        skipped = parsed.skipped_lines.len(),
        "loaded cookie file"
    );
    Ok(parsed)
}

fn parse_cookie_line(line: &str) -> Option<SessionCookie> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() <= VALUE_FIELD {
        return None;
    }
    let name = fields[NAME_FIELD].trim();
    if name.is_empty() {
        return None;
    }

    Some(SessionCookie {
        domain: fields[0].trim().to_string(),
        path: Some(fields[2].trim())
            .filter(|path| path.starts_with('/'))
            .unwrap_or("/")
            .to_string(),
        secure: fields[3].trim().eq_ignore_ascii_case("TRUE"),
        expires: fields[4].trim().parse().unwrap_or(0),
        name: name.to_string(),
        // Values may legitimately contain TABs once the fixed fields are consumed.
        value: fields[VALUE_FIELD..].join("\t"),
    })
}

/// Loads cookies into a fresh jar, scoped to each cookie's own domain.
///
/// Cookies with an empty domain are attached to `fallback_origin`. Expired
/// cookies are dropped.
#[instrument(level = "debug", skip(cookies))]
pub fn load_cookies_into_jar(cookies: &[SessionCookie], fallback_origin: &Url) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    for cookie in cookies {
        if cookie.is_expired_at(now) {
            debug!(name = %cookie.name, "dropping expired cookie");
            continue;
        }

        let origin = if cookie.domain.is_empty() {
            Some(fallback_origin.clone())
        } else {
            let host = cookie.domain.trim_start_matches('.');
            Url::parse(&format!("https://{host}{}", cookie.path)).ok()
        };
        let Some(origin) = origin else {
            warn!(domain = %cookie.domain, name = %cookie.name, "skipping cookie with unparseable domain");
            continue;
        };

        let mut set_cookie = format!("{}={}; Path={}", cookie.name, cookie.value, cookie.path);
        if !cookie.domain.is_empty() {
            set_cookie.push_str("; Domain=");
            set_cookie.push_str(cookie.domain.trim_start_matches('.'));
        }
        if cookie.secure {
            set_cookie.push_str("; Secure");
        }
        jar.add_cookie_str(&set_cookie, &origin);
    }

    jar
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;

    use reqwest::cookie::CookieStore;

    use super::*;

    const EXPORT: &str = "\
# Netscape HTTP Cookie File
# https://curl.se/docs/http-cookies.html
.terabox.app\tTRUE\t/\tTRUE\t0\tndus\tsecret-ndus
#HttpOnly_.terabox.app\tTRUE\t/\tTRUE\t0\tcsrfToken\tskipped
www.terabox.app\tFALSE\t/\tFALSE\t4102444800\tlang\ten

";

    #[test]
    fn test_parse_reads_name_and_value_fields() {
        let parsed = parse_netscape_cookies(Cursor::new(EXPORT)).unwrap();
        assert_eq!(parsed.cookies.len(), 2);
        assert!(parsed.skipped_lines.is_empty());
        assert_eq!(parsed.cookies[0].name, "ndus");
        assert_eq!(parsed.cookies[0].value(), "secret-ndus");
        assert!(parsed.cookies[0].secure);
        assert_eq!(parsed.cookies[1].name, "lang");
        assert_eq!(parsed.cookies[1].expires, 4_102_444_800);
    }

    #[test]
    fn test_hash_prefixed_lines_are_skipped() {
        let parsed = parse_netscape_cookies(Cursor::new(EXPORT)).unwrap();
        assert!(parsed.cookies.iter().all(|c| c.name != "csrfToken"));
    }

    #[test]
    fn test_short_lines_are_reported_not_fatal() {
        let input = "bad\tline\n.terabox.app\tTRUE\t/\tFALSE\t0\tndus\tv\n";
        let parsed = parse_netscape_cookies(Cursor::new(input)).unwrap();
        assert_eq!(parsed.cookies.len(), 1);
        assert_eq!(parsed.skipped_lines, vec![1]);
    }

    #[test]
    fn test_all_lines_malformed_is_an_error() {
        let err = parse_netscape_cookies(Cursor::new("one\ntwo\tthree\n")).unwrap_err();
        assert!(matches!(err, CookieError::NoCookiesFound { skipped: 2 }));
    }

    #[test]
    fn test_empty_export_is_empty_not_error() {
        let parsed = parse_netscape_cookies(Cursor::new("# only a header\n")).unwrap();
        assert!(parsed.cookies.is_empty());
    }

    #[test]
    fn test_lenient_fields_default() {
        let parsed =
            parse_netscape_cookies(Cursor::new("x.com\t?\t\t?\tsoon\tname\tval\n")).unwrap();
        let cookie = &parsed.cookies[0];
        assert_eq!(cookie.path, "/");
        assert!(!cookie.secure);
        assert_eq!(cookie.expires, 0);
    }

    #[test]
    fn test_debug_redacts_value() {
        let parsed = parse_netscape_cookies(Cursor::new(EXPORT)).unwrap();
        let debug = format!("{:?}", parsed.cookies[0]);
        assert!(!debug.contains("secret-ndus"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_jar_sends_cookies_to_matching_domain() {
        let parsed = parse_netscape_cookies(Cursor::new(EXPORT)).unwrap();
        let fallback = Url::parse("https://www.terabox.app/").unwrap();
        let jar = load_cookies_into_jar(&parsed.cookies, &fallback);

        let header = jar
            .cookies(&Url::parse("https://www.terabox.app/share/list").unwrap())
            .unwrap();
        let header = header.to_str().unwrap();
        assert!(header.contains("ndus=secret-ndus"));
        assert!(header.contains("lang=en"));
    }

    #[test]
    fn test_jar_drops_expired_cookies() {
        let parsed = parse_netscape_cookies(Cursor::new(
            ".terabox.app\tTRUE\t/\tFALSE\t1\told\tgone\n",
        ))
        .unwrap();
        let fallback = Url::parse("https://www.terabox.app/").unwrap();
        let jar = load_cookies_into_jar(&parsed.cookies, &fallback);
        assert!(
            jar.cookies(&Url::parse("https://www.terabox.app/").unwrap())
                .is_none()
        );
    }
}
