//! Session token extraction from the share page.
//!
//! The platform embeds a log id, a JavaScript anti-automation token and an
//! optional `bdstoken` in the share page. All three are located by bounded
//! substring search between fixed markers.

use super::ResolveError;

const LOG_ID_START: &str = "dp-logid=";
const LOG_ID_END: &str = "&";

/// The JS token sits inside a percent-encoded `fn("...")` call; some page
/// variants ship it unencoded.
const JS_TOKEN_MARKERS: [(&str, &str); 2] = [("fn%28%22", "%22%29"), ("fn(\"", "\")")];

const BDS_TOKEN_START: &str = "bdstoken\":\"";
const BDS_TOKEN_END: &str = "\"";

/// Returns the text strictly between the first occurrence of `start` and the
/// next occurrence of `end` after it.
///
/// The result may be empty when the markers are adjacent. Returns `None` when
/// either marker is absent.
#[must_use]
pub fn extract_between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let rest = &text[from..];
    let len = rest.find(end)?;
    Some(&rest[..len])
}

/// Tokens required by the listing API, scraped from one share page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    /// `dp-logid` request correlation id.
    pub log_id: String,
    /// Anti-automation `jsToken`.
    pub js_token: String,
    /// CSRF-style `bdstoken`; absent on logged-out pages.
    pub bds_token: Option<String>,
}

impl SessionTokens {
    /// Extracts the tokens from share page `html` fetched from `page_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::TokenExtractionFailed`] when the log id or JS
    /// token is missing or empty.
    pub fn from_page(html: &str, page_url: &str) -> Result<Self, ResolveError> {
        let log_id = extract_between(html, LOG_ID_START, LOG_ID_END)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ResolveError::token_missing("dp-logid", page_url))?;

        let js_token = JS_TOKEN_MARKERS
            .iter()
            .find_map(|(start, end)| {
                extract_between(html, start, end).filter(|value| !value.is_empty())
            })
            .ok_or_else(|| ResolveError::token_missing("jsToken", page_url))?;

        let bds_token = extract_between(html, BDS_TOKEN_START, BDS_TOKEN_END)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Self {
            log_id: log_id.to_string(),
            js_token: js_token.to_string(),
            bds_token,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const PAGE_URL: &str = "https://www.terabox.app/sharing/link?surl=abc";

    #[test]
    fn test_extract_between_basic() {
        assert_eq!(extract_between("x dp-logid=123&y", "dp-logid=", "&"), Some("123"));
    }

    #[test]
    fn test_extract_between_missing_start() {
        assert_eq!(extract_between("nothing here", "dp-logid=", "&"), None);
    }

    #[test]
    fn test_extract_between_missing_end() {
        assert_eq!(extract_between("dp-logid=123", "dp-logid=", "&"), None);
    }

    #[test]
    fn test_extract_between_adjacent_markers_is_empty() {
        assert_eq!(extract_between("dp-logid=&", "dp-logid=", "&"), Some(""));
    }

    #[test]
    fn test_extract_between_uses_first_start_and_next_end() {
        assert_eq!(extract_between("[a][b]", "[", "]"), Some("a"));
    }

    #[test]
    fn test_from_page_percent_encoded_js_token() {
        let html = r#"<a href="/x?dp-logid=999&t=1">x</a><script>fn%28%22ABC123%22%29</script>{"bdstoken":"bds1"}"#;
        let tokens = SessionTokens::from_page(html, PAGE_URL).unwrap();
        assert_eq!(tokens.log_id, "999");
        assert_eq!(tokens.js_token, "ABC123");
        assert_eq!(tokens.bds_token.as_deref(), Some("bds1"));
    }

    #[test]
    fn test_from_page_plain_js_token_variant() {
        let html = r#"dp-logid=42&q <script>fn("PLAIN")</script>"#;
        let tokens = SessionTokens::from_page(html, PAGE_URL).unwrap();
        assert_eq!(tokens.js_token, "PLAIN");
        assert_eq!(tokens.bds_token, None);
    }

    #[test]
    fn test_from_page_missing_log_id() {
        let err = SessionTokens::from_page("fn%28%22T%22%29", PAGE_URL).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenExtractionFailed);
        assert!(err.to_string().contains("dp-logid"));
    }

    #[test]
    fn test_from_page_missing_js_token() {
        let err = SessionTokens::from_page("dp-logid=1&", PAGE_URL).unwrap_err();
        assert!(err.to_string().contains("jsToken"));
    }

    #[test]
    fn test_from_page_empty_log_id_rejected() {
        let err = SessionTokens::from_page("dp-logid=&fn%28%22T%22%29", PAGE_URL).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TokenExtractionFailed);
    }
}
