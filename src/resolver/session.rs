//! Per-resolution HTTP session.
//!
//! Each resolution attempt opens its own [`Session`]: a cookie jar plus two
//! clients sharing it, one that follows redirects and one that does not.
//! Nothing is shared between concurrent resolutions.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, redirect};
use tracing::{debug, warn};
use url::Url;

use super::ResolveError;
use crate::net::build_client_with_fallback;
use crate::retry::RetryPolicy;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Redirect hops followed when loading a share page.
const MAX_PAGE_REDIRECTS: usize = 10;

/// Timeouts and retry policy applied to every resolver request.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout for a single attempt.
    pub request_timeout: Duration,
    /// Bounded retry for transient failures.
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

/// A fetched page after redirects.
#[derive(Debug)]
pub(crate) struct Page {
    pub url: Url,
    pub status: u16,
    pub body: String,
}

/// Metadata learned from a HEAD request.
#[derive(Debug, Default)]
pub(crate) struct Probe {
    pub final_url: String,
    pub status: u16,
    pub content_disposition: Option<String>,
    pub content_length: Option<u64>,
}

/// Browser-like headers sent on every platform request.
#[must_use]
pub(crate) fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9,hi;q=0.8"),
    );
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    let static_pairs: [(&str, &str); 7] = [
        ("sec-fetch-dest", "document"),
        ("sec-fetch-mode", "navigate"),
        ("sec-fetch-site", "none"),
        ("sec-fetch-user", "?1"),
        (
            "sec-ch-ua",
            "\"Not A(Brand\";v=\"99\", \"Google Chrome\";v=\"121\", \"Chromium\";v=\"121\"",
        ),
        ("sec-ch-ua-mobile", "?0"),
        ("sec-ch-ua-platform", "\"Windows\""),
    ];
    for (name, value) in static_pairs {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}

/// Builds a sensitive `Cookie` header value from a raw cookie string.
///
/// # Errors
///
/// Returns [`ResolveError::Setup`] if the cookie contains bytes that are not
/// valid in a header.
pub(crate) fn cookie_header_value(strategy: &str, cookie: &str) -> Result<HeaderValue, ResolveError> {
    let mut value = HeaderValue::from_str(cookie.trim()).map_err(|_| {
        ResolveError::setup(
            strategy,
            "session cookie contains characters not allowed in an HTTP header",
            "Copy the cookie value again without line breaks",
        )
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Per-resolution HTTP state.
pub(crate) struct Session {
    strategy: &'static str,
    client: Client,
    no_redirect: Client,
    retry: RetryPolicy,
    /// Extra headers for platform page and API requests (Host, Cookie).
    platform_headers: HeaderMap,
}

impl Session {
    /// Opens a session with a fresh client pair sharing `jar`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Setup`] when client construction fails.
    pub(crate) fn open(
        strategy: &'static str,
        http: &HttpSettings,
        user_agent: &str,
        default_headers: HeaderMap,
        jar: Arc<Jar>,
    ) -> Result<Self, ResolveError> {
        let client = build_client(strategy, http, user_agent, &default_headers, &jar, true)?;
        let no_redirect = build_client(strategy, http, user_agent, &default_headers, &jar, false)?;
        Ok(Self {
            strategy,
            client,
            no_redirect,
            retry: http.retry.clone(),
            platform_headers: HeaderMap::new(),
        })
    }

    /// Adds headers sent on platform page and API requests only.
    #[must_use]
    pub(crate) fn with_platform_headers(mut self, headers: HeaderMap) -> Self {
        self.platform_headers = headers;
        self
    }

    /// Loads a page, following redirects by hand so platform headers are
    /// re-sent on every hop.
    pub(crate) async fn get_page(&self, url: &str) -> Result<Page, ResolveError> {
        let mut current = Url::parse(url).map_err(|e| ResolveError::Network {
            url: url.to_string(),
            message: format!("invalid URL: {e}"),
        })?;

        for _ in 0..=MAX_PAGE_REDIRECTS {
            let target = current.clone();
            let response = self
                .retry
                .send(self.strategy, || {
                    self.no_redirect
                        .get(target.clone())
                        .headers(self.platform_headers.clone())
                })
                .await
                .map_err(|e| ResolveError::transport(target.as_str(), &e))?;

            if response.status().is_redirection()
                && let Some(next) = location_of(&response)
                && let Ok(next) = current.join(&next)
            {
                debug!(strategy = self.strategy, from = %current, to = %next, "following redirect");
                current = next;
                continue;
            }

            let status = response.status().as_u16();
            if !response.status().is_success() {
                warn!(strategy = self.strategy, url = %current, status, "share page returned non-success status");
            }
            let body = response
                .text()
                .await
                .map_err(|e| ResolveError::transport(current.as_str(), &e))?;
            return Ok(Page {
                url: current,
                status,
                body,
            });
        }

        Err(ResolveError::Network {
            url: url.to_string(),
            message: format!("more than {MAX_PAGE_REDIRECTS} redirects"),
        })
    }

    /// GETs a platform API endpoint; returns status and body text.
    pub(crate) async fn get_api(&self, url: &Url) -> Result<(u16, String), ResolveError> {
        let response = self
            .retry
            .send(self.strategy, || {
                self.client
                    .get(url.clone())
                    .headers(self.platform_headers.clone())
            })
            .await
            .map_err(|e| ResolveError::transport(url.as_str(), &e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::transport(url.as_str(), &e))?;
        Ok((status, body))
    }

    /// HEADs `url` without following redirects and returns its `Location`,
    /// made absolute against `url`.
    pub(crate) async fn redirect_target(&self, url: &str) -> Result<Option<String>, ResolveError> {
        let base = Url::parse(url).map_err(|e| ResolveError::Network {
            url: url.to_string(),
            message: format!("invalid URL: {e}"),
        })?;
        let cookie = self.platform_headers.get(header::COOKIE).cloned();
        let response = self
            .retry
            .send(self.strategy, || {
                let request = self.no_redirect.head(base.clone());
                with_optional_header(request, header::COOKIE, cookie.clone())
            })
            .await
            .map_err(|e| ResolveError::transport(url, &e))?;

        debug!(strategy = self.strategy, status = response.status().as_u16(), "dlink HEAD");
        Ok(location_of(&response).and_then(|loc| super::utils::absolutize_url(&loc, &base)))
    }

    /// HEADs `url` following redirects and reports what the final response said.
    pub(crate) async fn probe(&self, url: &str) -> Result<Probe, ResolveError> {
        let response = self
            .retry
            .send(self.strategy, || self.client.head(url))
            .await
            .map_err(|e| ResolveError::transport(url, &e))?;
        Ok(probe_from_response(&response))
    }

    /// POSTs a JSON body with extra headers; returns status and body text.
    pub(crate) async fn post_json(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: &serde_json::Value,
    ) -> Result<(u16, String), ResolveError> {
        let response = self
            .retry
            .send(self.strategy, || {
                self.client.post(url).headers(headers.clone()).json(body)
            })
            .await
            .map_err(|e| ResolveError::transport(url, &e))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ResolveError::transport(url, &e))?;
        Ok((status, text))
    }
}

pub(crate) fn probe_from_response(response: &Response) -> Probe {
    let headers = response.headers();
    Probe {
        final_url: response.url().to_string(),
        status: response.status().as_u16(),
        content_disposition: headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        content_length: headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok()),
    }
}

fn location_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn with_optional_header(
    request: RequestBuilder,
    name: HeaderName,
    value: Option<HeaderValue>,
) -> RequestBuilder {
    match value {
        Some(value) => request.header(name, value),
        None => request,
    }
}

fn build_client(
    strategy: &str,
    http: &HttpSettings,
    user_agent: &str,
    default_headers: &HeaderMap,
    jar: &Arc<Jar>,
    follow_redirects: bool,
) -> Result<Client, ResolveError> {
    build_client_with_fallback(strategy, || {
        let builder = Client::builder()
            .connect_timeout(http.connect_timeout)
            .timeout(http.request_timeout)
            .user_agent(user_agent)
            .default_headers(default_headers.clone())
            .cookie_provider(Arc::clone(jar))
            .gzip(true);
        if follow_redirects {
            builder
        } else {
            builder.redirect(redirect::Policy::none())
        }
    })
    .map_err(|reason| {
        ResolveError::setup(
            strategy,
            &reason,
            "Check proxy environment variables and TLS configuration",
        )
    })
}
