//! Strategy: delegate resolution to an external relay service.
//!
//! The relay takes `POST {"url": "<share link>"}` with an API key header and
//! answers with a `download_link`, or an `error_code` on failure. Name and
//! size are left provisional; the transfer pipeline fills them in from the
//! content server.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::{info, instrument};

use super::session::{HttpSettings, Session};
use super::{RelaySettings, ResolveError, ResolvedFile, Resolver};
use crate::parser::ShareLink;
use crate::user_agent::default_tool_user_agent;

const STRATEGY: &str = "relay-api";

/// Header carrying the relay API key unless configured otherwise.
pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    download_link: Option<String>,
    /// `Some` whenever the key is present, including `null`.
    #[serde(default, deserialize_with = "present")]
    error_code: Option<serde_json::Value>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl RelayResponse {
    fn error_text(&self) -> Option<String> {
        let code = self.error_code.as_ref()?;
        let detail = self
            .error_message
            .as_deref()
            .or(self.message.as_deref())
            .map(str::trim)
            .filter(|m| !m.is_empty());
        Some(match detail {
            Some(detail) => format!("{detail} (error_code {code})"),
            None => format!("error_code {code}"),
        })
    }
}

/// Interprets a relay response body.
///
/// # Errors
///
/// - [`ResolveError::UpstreamApiError`] for a non-200 status, a body that is
///   not JSON, or a body carrying `error_code`
/// - [`ResolveError::DirectLinkMissing`] when `download_link` is absent
pub(crate) fn parse_relay_response(status: u16, body: &str) -> Result<String, ResolveError> {
    if status != 200 {
        return Err(ResolveError::upstream(format!("relay returned HTTP {status}")));
    }
    let response: RelayResponse = serde_json::from_str(body)
        .map_err(|e| ResolveError::upstream(format!("relay response is not valid JSON: {e}")))?;
    if let Some(message) = response.error_text() {
        return Err(ResolveError::upstream(message));
    }
    super::utils::non_empty(response.download_link).ok_or_else(|| {
        ResolveError::direct_link_missing(STRATEGY, "relay response has no download_link")
    })
}

/// Resolves shares through a relay service.
#[derive(Debug)]
pub struct RelayResolver {
    relay: RelaySettings,
    http: HttpSettings,
}

impl RelayResolver {
    /// Creates the strategy.
    #[must_use]
    pub fn new(relay: RelaySettings, http: HttpSettings) -> Self {
        Self { relay, http }
    }

    fn request_headers(&self) -> Result<HeaderMap, ResolveError> {
        let name = HeaderName::from_bytes(self.relay.api_key_header.trim().as_bytes()).map_err(|_| {
            ResolveError::setup(
                STRATEGY,
                "relay api_key_header is not a valid header name",
                "Fix relay.api_key_header in the config file",
            )
        })?;
        let mut value = HeaderValue::from_str(self.relay.api_key.trim()).map_err(|_| {
            ResolveError::setup(
                STRATEGY,
                "relay API key is not a valid header value",
                "Check relay.api_key or TERADL_RELAY_API_KEY",
            )
        })?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(name, value);
        Ok(headers)
    }
}

#[async_trait]
impl Resolver for RelayResolver {
    fn name(&self) -> &str {
        STRATEGY
    }

    #[instrument(skip(self), fields(strategy = STRATEGY, short_code = link.short_code()))]
    async fn resolve(&self, link: &ShareLink) -> Result<ResolvedFile, ResolveError> {
        let session = Session::open(
            STRATEGY,
            &self.http,
            &default_tool_user_agent(),
            HeaderMap::new(),
            Arc::new(Jar::default()),
        )?;
        let body = serde_json::json!({ "url": link.as_str() });
        let (status, text) = session
            .post_json(self.relay.endpoint.as_str(), &self.request_headers()?, &body)
            .await?;

        let direct = parse_relay_response(status, &text)?;
        let file = ResolvedFile::provisional(direct)?;
        info!(file = file.file_name(), "share resolved via relay (metadata provisional)");
        Ok(file)
    }
}
