//! Strategy: cookies from a Netscape cookie export plus the listing API.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{info, instrument, warn};

use super::session::{HttpSettings, Session, browser_headers};
use super::{PlatformSettings, ResolveError, ResolvedFile, Resolver, listing};
use crate::auth::{SessionCookie, load_cookie_file, load_cookies_into_jar};
use crate::parser::ShareLink;

const STRATEGY: &str = "cookie-file";

/// Resolves shares using a cookie jar loaded from a browser cookie export.
///
/// Shares the page/token/listing flow with the cookie-header strategy, but
/// authenticates through the jar and takes the listing's `dlink` as the
/// direct link without a HEAD.
#[derive(Debug)]
pub struct CookieFileResolver {
    cookies: Vec<SessionCookie>,
    platform: PlatformSettings,
    http: HttpSettings,
}

impl CookieFileResolver {
    /// Creates the strategy from already-parsed cookies.
    #[must_use]
    pub fn new(cookies: Vec<SessionCookie>, platform: PlatformSettings, http: HttpSettings) -> Self {
        if cookies.is_empty() {
            warn!("cookie file strategy configured with no cookies; shares will resolve anonymously");
        }
        Self {
            cookies,
            platform,
            http,
        }
    }

    /// Loads and parses the cookie export at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Setup`] if the file cannot be read or holds no
    /// usable cookies.
    pub fn from_path(
        path: &Path,
        platform: PlatformSettings,
        http: HttpSettings,
    ) -> Result<Self, ResolveError> {
        let parsed = load_cookie_file(path).map_err(|e| {
            ResolveError::setup(
                STRATEGY,
                &format!("{}: {e}", path.display()),
                "Export cookies in Netscape format and check credentials.cookie_file",
            )
        })?;
        Ok(Self::new(parsed.cookies, platform, http))
    }

    fn platform_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(host) = &self.platform.host_header
            && let Ok(value) = HeaderValue::from_str(host)
        {
            headers.insert(header::HOST, value);
        }
        headers
    }
}

#[async_trait]
impl Resolver for CookieFileResolver {
    fn name(&self) -> &str {
        STRATEGY
    }

    #[instrument(skip(self), fields(strategy = STRATEGY, short_code = link.short_code()))]
    async fn resolve(&self, link: &ShareLink) -> Result<ResolvedFile, ResolveError> {
        let jar = load_cookies_into_jar(&self.cookies, &self.platform.api_base);
        let session = Session::open(
            STRATEGY,
            &self.http,
            &self.platform.user_agent,
            browser_headers(),
            jar,
        )?
        .with_platform_headers(self.platform_headers());

        let entry = listing::fetch_first_entry(&session, &self.platform, link).await?;
        let dlink = entry
            .dlink()
            .ok_or_else(|| ResolveError::direct_link_missing(STRATEGY, "listing entry has no dlink"))?
            .to_string();

        let file = entry.into_resolved(dlink)?;
        info!(file = file.file_name(), size = file.size(), "share resolved");
        Ok(file)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_from_path_missing_file_is_setup_error() {
        let err = CookieFileResolver::from_path(
            Path::new("/nonexistent/teradl/cookies.txt"),
            PlatformSettings::default(),
            HttpSettings::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("cookie-file"));
    }

    #[test]
    fn test_from_path_loads_cookies() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ".terabox.app\tTRUE\t/\tTRUE\t0\tndus\tabc").unwrap();
        let resolver = CookieFileResolver::from_path(
            file.path(),
            PlatformSettings::default(),
            HttpSettings::default(),
        )
        .unwrap();
        assert_eq!(resolver.cookies.len(), 1);
        assert_eq!(resolver.name(), "cookie-file");
    }

    #[test]
    fn test_platform_headers_omit_cookie() {
        let resolver = CookieFileResolver::new(
            Vec::new(),
            PlatformSettings::default(),
            HttpSettings::default(),
        );
        let headers = resolver.platform_headers();
        assert!(headers.get(header::COOKIE).is_none());
        assert_eq!(headers.get(header::HOST).unwrap(), "www.terabox.app");
    }
}
