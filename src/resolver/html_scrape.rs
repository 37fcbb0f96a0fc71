//! Strategy: pattern-match a download URL out of the share page.
//!
//! Works against page variants that inline the download URL in a script
//! block. No listing API call is made.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, info, instrument, warn};

use super::session::{HttpSettings, Session, browser_headers, cookie_header_value};
use super::utils::{absolutize_url, compile_static_regex, unescape_js_url};
use super::{PlatformSettings, ResolveError, ResolvedFile, Resolver};
use crate::download::filename::{name_from_url, parse_content_disposition};
use crate::parser::ShareLink;

const STRATEGY: &str = "html-scrape";

/// `downloadUrl: "..."`, `download_url = '...'`, `"dlink":"..."` and similar
/// assignments.
static DOWNLOAD_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?i)["']?\b(?:download_?url|download_?link|dlink)["']?\s*[:=]\s*["']([^"']+)["']"#,
    )
});

/// Returns the first download URL assigned in `html`, unescaped.
#[must_use]
pub(crate) fn find_download_url(html: &str) -> Option<String> {
    DOWNLOAD_URL_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_js_url(m.as_str().trim()))
        .find(|url| !url.is_empty())
}

/// Resolves shares by scraping the share page for a download URL.
pub struct HtmlScrapeResolver {
    cookie: Option<HeaderValue>,
    platform: PlatformSettings,
    http: HttpSettings,
}

impl std::fmt::Debug for HtmlScrapeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlScrapeResolver")
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl HtmlScrapeResolver {
    /// Creates the strategy; a session cookie is optional.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Setup`] if `cookie` is not a valid header value.
    pub fn new(
        cookie: Option<&str>,
        platform: PlatformSettings,
        http: HttpSettings,
    ) -> Result<Self, ResolveError> {
        let cookie = cookie
            .filter(|c| !c.trim().is_empty())
            .map(|c| cookie_header_value(STRATEGY, c))
            .transpose()?;
        Ok(Self {
            cookie,
            platform,
            http,
        })
    }

    fn platform_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &self.cookie {
            headers.insert(header::COOKIE, cookie.clone());
        }
        headers
    }
}

#[async_trait]
impl Resolver for HtmlScrapeResolver {
    fn name(&self) -> &str {
        STRATEGY
    }

    #[instrument(skip(self), fields(strategy = STRATEGY, short_code = link.short_code()))]
    async fn resolve(&self, link: &ShareLink) -> Result<ResolvedFile, ResolveError> {
        let session = Session::open(
            STRATEGY,
            &self.http,
            &self.platform.user_agent,
            browser_headers(),
            Arc::new(Jar::default()),
        )?
        .with_platform_headers(self.platform_headers());

        let page = session.get_page(&self.platform.share_page_url(link)).await?;
        let raw = find_download_url(&page.body)
            .ok_or_else(|| ResolveError::scrape_pattern_not_found(page.url.as_str()))?;
        let direct = absolutize_url(&raw, &page.url).ok_or_else(|| {
            ResolveError::direct_link_missing(STRATEGY, "scraped download URL is not a valid URL")
        })?;
        debug!(url = %direct, "download URL scraped");

        let (final_url, file_name, size) = match session.probe(&direct).await {
            Ok(probe) if (200..300).contains(&probe.status) => {
                let name = probe
                    .content_disposition
                    .as_deref()
                    .and_then(parse_content_disposition);
                (probe.final_url, name, probe.content_length)
            }
            Ok(probe) => {
                warn!(status = probe.status, "download URL probe returned non-success status");
                (direct.clone(), None, None)
            }
            Err(error) => {
                warn!(error = %error, "download URL probe failed");
                (direct.clone(), None, None)
            }
        };

        let file_name = file_name
            .or_else(|| name_from_url(&final_url))
            .unwrap_or_default();
        let file = ResolvedFile::new(file_name, direct, size.unwrap_or(0))?;
        info!(file = file.file_name(), size = file.size(), "share resolved");
        Ok(file)
    }
}
