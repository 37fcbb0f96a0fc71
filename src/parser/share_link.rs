//! Share-link classification and short-code extraction.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::{Regex, RegexSet};
use tracing::{debug, trace};
use url::Url;

use super::error::{LinkRejection, MAX_LINK_LENGTH};

/// Host-name patterns covering the platform's regional and rebranded mirrors.
///
/// Matching is containment, not equality, so a pattern accepts any URL that
/// mentions the host anywhere (path and query variations included).
pub const SHARE_DOMAIN_PATTERNS: [&str; 20] = [
    r"ww\.mirrobox\.com",
    r"www\.nephobox\.com",
    r"freeterabox\.com",
    r"www\.freeterabox\.com",
    r"1024tera\.com",
    r"4funbox\.co",
    r"www\.4funbox\.com",
    r"mirrobox\.com",
    r"nephobox\.com",
    r"terabox\.app",
    r"terabox\.com",
    r"www\.terabox\.ap",
    r"www\.terabox\.com",
    r"www\.1024tera\.co",
    r"www\.momerybox\.com",
    r"teraboxapp\.com",
    r"momerybox\.com",
    r"tibibox\.com",
    r"www\.tibibox\.com",
    r"www\.teraboxapp\.com",
];

#[allow(clippy::expect_used)]
static SHARE_DOMAINS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(SHARE_DOMAIN_PATTERNS).expect("share domain patterns are valid") // Static patterns
});

#[allow(clippy::expect_used)]
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"'\]]+"#).expect("URL regex is valid") // Static pattern
});

/// A validated share link: the URL, its short-code, and its host.
///
/// Immutable once constructed; the short-code is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    url: Url,
    short_code: String,
    domain: String,
}

impl ShareLink {
    /// The full share URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The share URL as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The platform short-code (`surl`) identifying the share.
    #[must_use]
    pub fn short_code(&self) -> &str {
        &self.short_code
    }

    /// The host the link was issued from.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Returns true if `text` mentions any known share domain.
#[must_use]
pub fn is_supported_share_host(text: &str) -> bool {
    SHARE_DOMAINS.is_match(text)
}

/// Classifies free text as a share link.
///
/// The first `http(s)://` URL in the text that mentions a share domain is used;
/// a bare `terabox.com/s/...` token is accepted with `https://` assumed.
///
/// # Errors
///
/// Returns [`LinkRejection::UnsupportedDomain`] when no share domain is
/// mentioned, and [`LinkRejection::MalformedUrl`] when one is mentioned but the
/// candidate cannot be parsed or carries no short-code.
///
/// # Examples
///
/// ```
/// use teradl_core::parser::validate;
///
/// let link = validate("https://terabox.com/s/1abc").unwrap();
/// assert_eq!(link.short_code(), "abc");
/// assert!(validate("https://drive.google.com/x").is_err());
/// ```
#[tracing::instrument(skip(text), fields(input_len = text.len()))]
pub fn validate(text: &str) -> Result<ShareLink, LinkRejection> {
    let trimmed = text.trim();
    if !is_supported_share_host(trimmed) {
        debug!("no share domain in input");
        return Err(LinkRejection::unsupported_domain(trimmed));
    }

    let candidate = find_candidate(trimmed);
    trace!(candidate = %candidate, "share link candidate");
    if candidate.len() > MAX_LINK_LENGTH {
        return Err(LinkRejection::malformed(
            &candidate,
            &format!("longer than {MAX_LINK_LENGTH} characters"),
        ));
    }

    let url = Url::parse(&candidate)
        .map_err(|e| LinkRejection::malformed(&candidate, &e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LinkRejection::malformed(
            &candidate,
            &format!("scheme '{}' is not supported", url.scheme()),
        ));
    }
    let Some(domain) = url.host_str().map(str::to_ascii_lowercase) else {
        return Err(LinkRejection::malformed(&candidate, "URL has no host"));
    };

    let short_code = extract_surl_from_url(url.as_str())
        .or_else(|| short_code_from_path(&url))
        .ok_or_else(|| LinkRejection::missing_short_code(&candidate))?;

    debug!(domain = %domain, short_code = %short_code, "share link accepted");
    Ok(ShareLink {
        url,
        short_code,
        domain,
    })
}

/// Reads the `surl` query parameter from a URL, if present and non-empty.
///
/// Strategies use this on the *redirected* share page URL, which is where the
/// platform exposes the canonical short-code.
#[must_use]
pub fn extract_surl_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "surl")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Short-code from a `/s/1<code>` path; the leading `1` is a version marker.
fn short_code_from_path(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    let code = segments
        .windows(2)
        .find(|pair| pair[0] == "s")
        .map(|pair| pair[1].trim())
        .filter(|code| !code.is_empty())?;
    let code = code
        .strip_prefix('1')
        .filter(|rest| !rest.is_empty())
        .unwrap_or(code);
    Some(code.to_string())
}

fn find_candidate(text: &str) -> Cow<'_, str> {
    if let Some(found) = URL_PATTERN
        .find_iter(text)
        .map(|m| clean_url_trailing(m.as_str()))
        .find(|candidate| is_supported_share_host(candidate))
    {
        return Cow::Borrowed(found);
    }

    let token = text
        .split_whitespace()
        .map(clean_url_trailing)
        .find(|token| is_supported_share_host(token))
        .unwrap_or(text);
    if token.contains("://") {
        Cow::Borrowed(token)
    } else {
        Cow::Owned(format!("https://{}", token.trim_start_matches('/')))
    }
}

fn clean_url_trailing(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']'])
}
