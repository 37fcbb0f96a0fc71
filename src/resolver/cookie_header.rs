//! Strategy: raw session cookie header plus the listing API.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, info, instrument};

use super::session::{HttpSettings, Session, browser_headers, cookie_header_value};
use super::{PlatformSettings, ResolveError, ResolvedFile, Resolver, listing};
use crate::parser::ShareLink;

const STRATEGY: &str = "cookie-header";

/// Resolves shares with a session cookie copied from a logged-in browser.
///
/// Flow: share page (twice, following redirects) -> tokens and `surl` ->
/// listing API -> HEAD on `dlink` without following redirects; the
/// `Location` header is the direct link.
pub struct CookieHeaderResolver {
    cookie: HeaderValue,
    platform: PlatformSettings,
    http: HttpSettings,
}

impl fmt::Debug for CookieHeaderResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieHeaderResolver")
            .field("cookie", &"<redacted>")
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

impl CookieHeaderResolver {
    /// Creates the strategy from a raw `Cookie` header value.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Setup`] if the cookie is empty or not a valid
    /// header value.
    pub fn new(
        cookie: &str,
        platform: PlatformSettings,
        http: HttpSettings,
    ) -> Result<Self, ResolveError> {
        if cookie.trim().is_empty() {
            return Err(ResolveError::setup(
                STRATEGY,
                "session cookie is empty",
                "Copy the Cookie header from a logged-in browser session",
            ));
        }
        Ok(Self {
            cookie: cookie_header_value(STRATEGY, cookie)?,
            platform,
            http,
        })
    }

    fn platform_headers(&self) -> Result<HeaderMap, ResolveError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, self.cookie.clone());
        if let Some(host) = &self.platform.host_header {
            let value = HeaderValue::from_str(host).map_err(|_| {
                ResolveError::setup(
                    STRATEGY,
                    "platform host header is not a valid header value",
                    "Fix platform.host_header in the config file",
                )
            })?;
            headers.insert(header::HOST, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Resolver for CookieHeaderResolver {
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
        .with_platform_headers(self.platform_headers()?);

        let entry = listing::fetch_first_entry(&session, &self.platform, link).await?;
        let dlink = entry
            .dlink()
            .ok_or_else(|| ResolveError::direct_link_missing(STRATEGY, "listing entry has no dlink"))?
            .to_string();
        debug!(file = %entry.server_filename, "listing entry found");

        let direct = session.redirect_target(&dlink).await?.ok_or_else(|| {
            ResolveError::direct_link_missing(STRATEGY, "dlink HEAD response had no Location header")
        })?;

        let file = entry.into_resolved(direct)?;
        info!(file = file.file_name(), size = file.size(), "share resolved");
        Ok(file)
    }
}
