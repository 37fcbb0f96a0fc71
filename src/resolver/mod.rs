//! Share-link resolution: turning a [`ShareLink`] into a [`ResolvedFile`].
//!
//! The platform has no stable public API, so resolution is a scraping
//! protocol. Several interchangeable strategies implement [`Resolver`]:
//!
//! - [`CookieHeaderResolver`] - raw session cookie header, share page tokens,
//!   listing API, then a HEAD on `dlink` to reach the content server
//! - [`CookieFileResolver`] - same flow with cookies from a Netscape cookie file
//! - [`HtmlScrapeResolver`] - pattern match a download URL out of the share page
//! - [`RelayResolver`] - delegate to an external relay service
//! - [`ResolverChain`] - try strategies in order until one succeeds
//!
//! Every resolution opens its own HTTP session; no cookies or tokens leak
//! between concurrent resolutions.
//!
//! # Example
//!
//! ```no_run
//! use teradl_core::parser::validate;
//! use teradl_core::resolver::{ResolverSettings, StrategyKind, build_resolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ResolverSettings {
//!     cookie: Some("ndus=...".to_string()),
//!     ..ResolverSettings::default()
//! };
//! let resolver = build_resolver(StrategyKind::CookieHeader, &settings)?;
//! let link = validate("https://teraboxapp.com/s/1abcDEF")?;
//! let file = resolver.resolve(&link).await?;
//! println!("{} ({})", file.file_name(), file.size());
//! # Ok(())
//! # }
//! ```

mod chain;
mod cookie_file;
mod cookie_header;
mod error;
mod html_scrape;
pub mod listing;
mod relay;
mod session;
pub mod tokens;
mod utils;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

pub use chain::ResolverChain;
pub use cookie_file::CookieFileResolver;
pub use cookie_header::CookieHeaderResolver;
pub use error::ResolveError;
pub use html_scrape::HtmlScrapeResolver;
pub use relay::{DEFAULT_API_KEY_HEADER, RelayResolver};
pub use session::HttpSettings;

use crate::download::filename::{FALLBACK_FILE_NAME, name_from_url};
use crate::parser::ShareLink;
use crate::size::format_size;
use crate::user_agent::BROWSER_USER_AGENT;

/// Default platform origin for the listing API.
pub const DEFAULT_API_BASE: &str = "https://www.terabox.app";

/// Application id the web client sends with listing requests.
pub const DEFAULT_APP_ID: &str = "250528";

/// `Host` header the platform expects on page and API requests.
pub const DEFAULT_HOST_HEADER: &str = "www.terabox.app";

/// The outcome of a successful resolution.
///
/// `size` is always the human-readable rendering of `size_bytes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFile {
    file_name: String,
    direct_link: String,
    thumbnail_url: Option<String>,
    size_bytes: u64,
    size: String,
    metadata_complete: bool,
}

impl ResolvedFile {
    /// Creates a resolved file with known metadata.
    ///
    /// An empty name falls back to the last path segment of `direct_link`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::DirectLinkMissing`] if `direct_link` is empty.
    pub fn new(
        file_name: impl Into<String>,
        direct_link: impl Into<String>,
        size_bytes: u64,
    ) -> Result<Self, ResolveError> {
        let direct_link = direct_link.into().trim().to_string();
        if direct_link.is_empty() {
            return Err(ResolveError::direct_link_missing(
                "resolver",
                "direct link is empty",
            ));
        }
        let file_name = file_name.into().trim().to_string();
        let file_name = if file_name.is_empty() {
            name_from_url(&direct_link).unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
        } else {
            file_name
        };
        Ok(Self {
            file_name,
            size: format_size(size_bytes),
            direct_link,
            thumbnail_url: None,
            size_bytes,
            metadata_complete: true,
        })
    }

    /// Creates a resolved file from a bare direct link.
    ///
    /// Name and size are placeholders until [`ResolvedFile::refine`] is called
    /// with what the content server reports.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::DirectLinkMissing`] if `direct_link` is empty.
    pub fn provisional(direct_link: impl Into<String>) -> Result<Self, ResolveError> {
        let mut file = Self::new(String::new(), direct_link, 0)?;
        file.metadata_complete = false;
        Ok(file)
    }

    /// Attaches a thumbnail URL.
    #[must_use]
    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Applies name and size learned from the content server.
    ///
    /// A listing-provided name is kept; a provisional name is replaced.
    pub fn refine(&mut self, file_name: Option<String>, size_bytes: Option<u64>) {
        if !self.metadata_complete
            && let Some(name) = file_name.filter(|n| !n.trim().is_empty())
        {
            self.file_name = name.trim().to_string();
        }
        if let Some(bytes) = size_bytes
            && (self.size_bytes == 0 || !self.metadata_complete)
        {
            self.size_bytes = bytes;
            self.size = format_size(bytes);
        }
        self.metadata_complete = true;
    }

    /// Display name of the file.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// URL that serves the file bytes.
    #[must_use]
    pub fn direct_link(&self) -> &str {
        &self.direct_link
    }

    /// Preview image URL, when the platform provided one.
    #[must_use]
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }

    /// Size in bytes; zero when unknown.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Human-readable size.
    #[must_use]
    pub fn size(&self) -> &str {
        &self.size
    }

    /// False while name and size are still placeholders.
    #[must_use]
    pub fn is_metadata_complete(&self) -> bool {
        self.metadata_complete
    }
}

/// A resolution strategy.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Strategy name used in logs and errors (e.g. "cookie-header").
    fn name(&self) -> &str;

    /// Resolves a validated share link.
    async fn resolve(&self, link: &ShareLink) -> Result<ResolvedFile, ResolveError>;
}

/// Which strategy to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Raw cookie header plus listing API.
    #[default]
    CookieHeader,
    /// Netscape cookie file plus listing API.
    CookieFile,
    /// Scrape a download URL out of the share page.
    HtmlScrape,
    /// External relay service.
    RelayApi,
}

impl StrategyKind {
    /// Kebab-case name, matching the config file spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CookieHeader => "cookie-header",
            Self::CookieFile => "cookie-file",
            Self::HtmlScrape => "html-scrape",
            Self::RelayApi => "relay-api",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cookie-header" => Ok(Self::CookieHeader),
            "cookie-file" => Ok(Self::CookieFile),
            "html-scrape" => Ok(Self::HtmlScrape),
            "relay-api" => Ok(Self::RelayApi),
            other => Err(format!(
                "unknown strategy '{other}' (expected cookie-header, cookie-file, html-scrape or relay-api)"
            )),
        }
    }
}

/// Platform endpoints and identity.
#[derive(Debug, Clone)]
pub struct PlatformSettings {
    /// Origin of the listing API.
    pub api_base: Url,
    /// `app_id` listing parameter.
    pub app_id: String,
    /// `Host` header for page and API requests; `None` derives it from the URL.
    pub host_header: Option<String>,
    /// User-Agent presented to the platform.
    pub user_agent: String,
    /// When set, share pages are fetched from this origin instead of the
    /// link's own host (mirrors, test servers).
    pub share_origin: Option<Url>,
}

impl Default for PlatformSettings {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("valid default api base"), // Static value
            app_id: DEFAULT_APP_ID.to_string(),
            host_header: Some(DEFAULT_HOST_HEADER.to_string()),
            user_agent: BROWSER_USER_AGENT.to_string(),
            share_origin: None,
        }
    }
}

impl PlatformSettings {
    /// URL the share page is requested from.
    #[must_use]
    pub fn share_page_url(&self, link: &ShareLink) -> String {
        let Some(origin) = &self.share_origin else {
            return link.as_str().to_string();
        };
        let mut url = origin.clone();
        url.set_path(link.url().path());
        url.set_query(link.url().query());
        url.to_string()
    }
}

/// Relay service endpoint and credentials.
#[derive(Clone)]
pub struct RelaySettings {
    /// Endpoint receiving `POST {"url": ...}`.
    pub endpoint: Url,
    /// API key value.
    pub api_key: String,
    /// Header carrying the API key.
    pub api_key_header: String,
}

impl fmt::Debug for RelaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaySettings")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .field("api_key_header", &self.api_key_header)
            .finish()
    }
}

/// Everything a strategy needs to be constructed.
#[derive(Clone, Default)]
pub struct ResolverSettings {
    /// Platform endpoints.
    pub platform: PlatformSettings,
    /// Timeouts and retry.
    pub http: HttpSettings,
    /// Raw `Cookie` header value for the cookie-header strategy.
    pub cookie: Option<String>,
    /// Netscape cookie file for the cookie-file strategy.
    pub cookie_file: Option<PathBuf>,
    /// Relay service for the relay-api strategy.
    pub relay: Option<RelaySettings>,
}

impl fmt::Debug for ResolverSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverSettings")
            .field("platform", &self.platform)
            .field("http", &self.http)
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .field("cookie_file", &self.cookie_file)
            .field("relay", &self.relay)
            .finish()
    }
}

/// Builds one strategy from settings.
///
/// # Errors
///
/// Returns [`ResolveError::Setup`] when the strategy's credentials are
/// missing or unreadable.
pub fn build_resolver(
    kind: StrategyKind,
    settings: &ResolverSettings,
) -> Result<Box<dyn Resolver>, ResolveError> {
    let resolver: Box<dyn Resolver> = match kind {
        StrategyKind::CookieHeader => {
            let cookie = settings.cookie.as_deref().ok_or_else(|| {
                ResolveError::setup(
                    kind.as_str(),
                    "no session cookie configured",
                    "Set credentials.cookie in the config file or TERADL_COOKIE",
                )
            })?;
            Box::new(CookieHeaderResolver::new(
                cookie,
                settings.platform.clone(),
                settings.http.clone(),
            )?)
        }
        StrategyKind::CookieFile => {
            let path = settings.cookie_file.as_deref().ok_or_else(|| {
                ResolveError::setup(
                    kind.as_str(),
                    "no cookie file configured",
                    "Set credentials.cookie_file in the config file or TERADL_COOKIE_FILE",
                )
            })?;
            Box::new(CookieFileResolver::from_path(
                path,
                settings.platform.clone(),
                settings.http.clone(),
            )?)
        }
        StrategyKind::HtmlScrape => Box::new(HtmlScrapeResolver::new(
            settings.cookie.as_deref(),
            settings.platform.clone(),
            settings.http.clone(),
        )?),
        StrategyKind::RelayApi => {
            let relay = settings.relay.clone().ok_or_else(|| {
                ResolveError::setup(
                    kind.as_str(),
                    "no relay endpoint configured",
                    "Set [relay] endpoint and api_key, or TERADL_RELAY_ENDPOINT and TERADL_RELAY_API_KEY",
                )
            })?;
            Box::new(RelayResolver::new(relay, settings.http.clone()))
        }
    };
    Ok(resolver)
}

/// Builds a primary strategy followed by fallbacks.
///
/// Fallbacks whose credentials are missing are skipped with a warning; the
/// primary strategy must build.
///
/// # Errors
///
/// Returns the primary strategy's construction error.
pub fn build_resolver_chain(
    primary: StrategyKind,
    fallbacks: &[StrategyKind],
    settings: &ResolverSettings,
) -> Result<ResolverChain, ResolveError> {
    let mut chain = ResolverChain::new(build_resolver(primary, settings)?);
    for kind in fallbacks.iter().copied().filter(|k| *k != primary) {
        match build_resolver(kind, settings) {
            Ok(resolver) => chain.push(resolver),
            Err(error) => tracing::warn!(strategy = %kind, error = %error, "fallback strategy unavailable"),
        }
    }
    Ok(chain)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::parser::validate;

    #[test]
    fn test_resolved_file_size_matches_bytes() {
        let file = ResolvedFile::new("clip.mp4", "https://cdn.example/clip.mp4", 1536).unwrap();
        assert_eq!(file.size_bytes(), 1536);
        assert_eq!(file.size(), "1.50 KB");
        assert!(file.is_metadata_complete());
    }

    #[test]
    fn test_resolved_file_empty_link_rejected() {
        let err = ResolvedFile::new("clip.mp4", "  ", 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectLinkMissing);
    }

    #[test]
    fn test_resolved_file_empty_name_falls_back_to_url() {
        let file = ResolvedFile::new("", "https://cdn.example/path/movie.mkv?x=1", 0).unwrap();
        assert_eq!(file.file_name(), "movie.mkv");
    }

    #[test]
    fn test_provisional_then_refine() {
        let mut file = ResolvedFile::provisional("https://cdn.example/").unwrap();
        assert_eq!(file.file_name(), FALLBACK_FILE_NAME);
        assert!(!file.is_metadata_complete());
        file.refine(Some("real.mp4".to_string()), Some(2048));
        assert_eq!(file.file_name(), "real.mp4");
        assert_eq!(file.size(), "2.00 KB");
        assert!(file.is_metadata_complete());
    }

    #[test]
    fn test_refine_keeps_listing_name() {
        let mut file = ResolvedFile::new("listing.mp4", "https://cdn.example/x", 10).unwrap();
        file.refine(Some("header.mp4".to_string()), Some(99));
        assert_eq!(file.file_name(), "listing.mp4");
        assert_eq!(file.size_bytes(), 10);
    }

    #[test]
    fn test_strategy_kind_round_trip_names() {
        for kind in [
            StrategyKind::CookieHeader,
            StrategyKind::CookieFile,
            StrategyKind::HtmlScrape,
            StrategyKind::RelayApi,
        ] {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!("bogus".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_platform_defaults() {
        let settings = PlatformSettings::default();
        assert_eq!(settings.api_base.host_str(), Some("www.terabox.app"));
        assert_eq!(settings.api_base.scheme(), "https");
        assert_eq!(settings.app_id, DEFAULT_APP_ID);
        assert_eq!(settings.host_header.as_deref(), Some(DEFAULT_HOST_HEADER));
        assert!(settings.share_origin.is_none());
    }

    #[test]
    fn test_share_page_url_override_keeps_path_and_query() {
        let link = validate("https://teraboxapp.com/s/1abc?pwd=x").unwrap();
        let platform = PlatformSettings {
            share_origin: Some(Url::parse("http://127.0.0.1:8080").unwrap()),
            ..PlatformSettings::default()
        };
        assert_eq!(
            platform.share_page_url(&link),
            "http://127.0.0.1:8080/s/1abc?pwd=x"
        );
    }

    #[test]
    fn test_build_resolver_cookie_header_requires_cookie() {
        let Err(err) = build_resolver(StrategyKind::CookieHeader, &ResolverSettings::default())
        else {
            panic!("expected setup error");
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_build_resolver_relay_requires_endpoint() {
        let Err(err) = build_resolver(StrategyKind::RelayApi, &ResolverSettings::default()) else {
            panic!("expected setup error");
        };
        assert!(err.to_string().contains("relay"));
    }

    #[test]
    fn test_build_resolver_chain_skips_unconfigured_fallbacks() {
        let settings = ResolverSettings {
            cookie: Some("ndus=abc".to_string()),
            ..ResolverSettings::default()
        };
        let chain = build_resolver_chain(
            StrategyKind::CookieHeader,
            &[StrategyKind::RelayApi, StrategyKind::HtmlScrape],
            &settings,
        )
        .unwrap();
        assert_eq!(chain.strategy_names(), vec!["cookie-header", "html-scrape"]);
    }

    #[test]
    fn test_resolver_settings_debug_redacts_cookie() {
        let settings = ResolverSettings {
            cookie: Some("ndus=secret".to_string()),
            ..ResolverSettings::default()
        };
        assert!(!format!("{settings:?}").contains("secret"));
    }
}
