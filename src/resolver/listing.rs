//! Share listing API: request construction and response validation.
//!
//! Shared by the cookie-header and cookie-file strategies, which differ only
//! in how the session is authenticated and how the final link is derived.

use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};
use url::Url;

use super::session::Session;
use super::tokens::SessionTokens;
use super::{PlatformSettings, ResolveError, ResolvedFile};
use crate::parser::{ShareLink, extract_surl_from_url};

/// Listing response envelope.
#[derive(Debug, Deserialize)]
pub struct ListingResponse {
    /// Platform status code; zero means success.
    pub errno: i64,
    /// Files in the share root.
    #[serde(default)]
    pub list: Option<Vec<ListingEntry>>,
    /// Optional platform error text.
    #[serde(default)]
    pub errmsg: Option<String>,
}

/// One file in a share listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingEntry {
    /// Display name.
    pub server_filename: String,
    /// Size in bytes; the platform sends either a number or a numeric string.
    #[serde(deserialize_with = "number_or_string")]
    pub size: u64,
    /// Download link; requires a HEAD to reach the content server.
    #[serde(default)]
    pub dlink: Option<String>,
    /// Thumbnail URLs.
    #[serde(default)]
    pub thumbs: Option<Thumbnails>,
}

/// Thumbnail variants attached to a listing entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thumbnails {
    /// Largest preview image.
    #[serde(default)]
    pub url3: Option<String>,
}

impl ListingEntry {
    /// The non-empty `dlink`, if any.
    #[must_use]
    pub fn dlink(&self) -> Option<&str> {
        self.dlink
            .as_deref()
            .map(str::trim)
            .filter(|link| !link.is_empty())
    }

    /// Builds the resolved file from this entry and the final direct link.
    pub(crate) fn into_resolved(self, direct_link: String) -> Result<ResolvedFile, ResolveError> {
        let thumbnail = super::utils::non_empty(self.thumbs.and_then(|t| t.url3));
        let file = ResolvedFile::new(self.server_filename, direct_link, self.size)?;
        Ok(match thumbnail {
            Some(url) => file.with_thumbnail(url),
            None => file,
        })
    }
}

fn number_or_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Checks a listing response and returns its first entry.
///
/// Multi-file shares resolve to the first file only.
///
/// # Errors
///
/// Returns [`ResolveError::ListingError`] when the status is not 200, the
/// body is not a listing, `errno` is non-zero, or the list is empty.
pub fn validate_listing(status: u16, body: &str) -> Result<ListingEntry, ResolveError> {
    if status != 200 {
        return Err(ResolveError::listing_status(status));
    }
    let response: ListingResponse =
        serde_json::from_str(body).map_err(|e| ResolveError::listing_malformed(&e.to_string()))?;
    if response.errno != 0 {
        return Err(ResolveError::listing_rejected(
            response.errno,
            response.errmsg.as_deref(),
        ));
    }
    let mut entries = response.list.unwrap_or_default();
    if entries.len() > 1 {
        warn!(
            files = entries.len(),
            "share contains multiple files; resolving the first"
        );
    }
    if entries.is_empty() {
        return Err(ResolveError::listing_rejected(0, None));
    }
    Ok(entries.swap_remove(0))
}

impl PlatformSettings {
    /// Listing API URL for one short-code.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Setup`] if `api_base` cannot be joined.
    pub fn listing_url(&self, tokens: &SessionTokens, short_code: &str) -> Result<Url, ResolveError> {
        let mut url = self.api_base.join("/share/list").map_err(|e| {
            ResolveError::setup(
                "listing",
                &format!("invalid platform api_base: {e}"),
                "Set platform.api_base to an absolute http(s) URL",
            )
        })?;
        url.query_pairs_mut()
            .append_pair("app_id", &self.app_id)
            .append_pair("web", "1")
            .append_pair("channel", "0")
            .append_pair("jsToken", &tokens.js_token)
            .append_pair("dp-logid", &tokens.log_id)
            .append_pair("page", "1")
            .append_pair("num", "20")
            .append_pair("by", "name")
            .append_pair("order", "asc")
            .append_pair("site_referer", "")
            .append_pair("shorturl", short_code)
            .append_pair("root", "1");
        Ok(url)
    }
}

/// Loads the share page, scrapes tokens and fetches the first listing entry.
///
/// The share page is requested twice: once from the submitted link, then
/// again from wherever that landed, which is the page carrying `surl`.
pub(crate) async fn fetch_first_entry(
    session: &Session,
    platform: &PlatformSettings,
    link: &ShareLink,
) -> Result<ListingEntry, ResolveError> {
    let first = session.get_page(&platform.share_page_url(link)).await?;
    let page = session.get_page(first.url.as_str()).await?;
    debug!(url = %page.url, status = page.status, bytes = page.body.len(), "share page loaded");

    let tokens = SessionTokens::from_page(&page.body, page.url.as_str())?;
    let short_code = extract_surl_from_url(page.url.as_str())
        .ok_or_else(|| ResolveError::short_url_missing(page.url.as_str()))?;

    let listing_url = platform.listing_url(&tokens, &short_code)?;
    let (status, body) = session.get_api(&listing_url).await?;
    validate_listing(status, &body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_validate_listing_numeric_size() {
        let body = r#"{"errno":0,"list":[{"server_filename":"clip.mp4","size":2048,"dlink":"https://d.example/x","thumbs":{"url3":"https://t.example/3.jpg"}}]}"#;
        let entry = validate_listing(200, body).unwrap();
        assert_eq!(entry.server_filename, "clip.mp4");
        assert_eq!(entry.size, 2048);
        assert_eq!(entry.dlink(), Some("https://d.example/x"));
    }

    #[test]
    fn test_validate_listing_string_size() {
        let body = r#"{"errno":0,"list":[{"server_filename":"a.bin","size":"1536"}]}"#;
        let entry = validate_listing(200, body).unwrap();
        assert_eq!(entry.size, 1536);
        assert_eq!(entry.dlink(), None);
    }

    #[test]
    fn test_validate_listing_empty_list_is_error() {
        let err = validate_listing(200, r#"{"errno":0,"list":[]}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ListingError);
    }

    #[test]
    fn test_validate_listing_missing_list_is_error() {
        let err = validate_listing(200, r#"{"errno":0}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ListingError);
    }

    #[test]
    fn test_validate_listing_nonzero_errno() {
        let err = validate_listing(200, r#"{"errno":-9,"errmsg":"gone","list":[]}"#).unwrap_err();
        match err {
            ResolveError::ListingError { errno, .. } => assert_eq!(errno, Some(-9)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_listing_bad_status() {
        let err = validate_listing(503, "").unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_validate_listing_not_json() {
        let err = validate_listing(200, "<html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ListingError);
    }

    #[test]
    fn test_validate_listing_takes_first_of_many() {
        let body = r#"{"errno":0,"list":[{"server_filename":"1.mp4","size":1},{"server_filename":"2.mp4","size":2}]}"#;
        assert_eq!(validate_listing(200, body).unwrap().server_filename, "1.mp4");
    }

    #[test]
    fn test_listing_url_parameters() {
        let platform = PlatformSettings::default();
        let tokens = SessionTokens {
            log_id: "999".to_string(),
            js_token: "JS".to_string(),
            bds_token: None,
        };
        let url = platform.listing_url(&tokens, "abc").unwrap();
        assert_eq!(url.path(), "/share/list");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("app_id".to_string(), "250528".to_string())));
        assert!(pairs.contains(&("jsToken".to_string(), "JS".to_string())));
        assert!(pairs.contains(&("dp-logid".to_string(), "999".to_string())));
        assert!(pairs.contains(&("shorturl".to_string(), "abc".to_string())));
        assert!(pairs.contains(&("root".to_string(), "1".to_string())));
    }

    #[test]
    fn test_into_resolved_keeps_thumbnail() {
        let body = r#"{"errno":0,"list":[{"server_filename":"clip.mp4","size":1024,"thumbs":{"url3":"https://t.example/3.jpg"}}]}"#;
        let entry = validate_listing(200, body).unwrap();
        let file = entry
            .into_resolved("https://cdn.example/clip.mp4".to_string())
            .unwrap();
        assert_eq!(file.thumbnail_url(), Some("https://t.example/3.jpg"));
        assert_eq!(file.size(), "1.00 KB");
    }
}
