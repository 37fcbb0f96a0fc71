//! Error types for share-link resolution.
//!
//! Every variant is terminal for the current attempt; messages follow the
//! What / Suggestion pattern used across the crate.

use thiserror::Error;

use crate::error::ErrorKind;
use crate::parser::LinkRejection;

/// Errors that can occur while turning a share link into a direct link.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The input was not an acceptable share link.
    #[error(transparent)]
    InvalidLink(#[from] LinkRejection),

    /// A required session token was absent from the share page.
    #[error(
        "could not extract {token} from share page {url}\n  Suggestion: The session cookie may have expired or the page layout changed; refresh the cookie"
    )]
    TokenExtractionFailed {
        /// Which token was missing.
        token: &'static str,
        /// Page the token was expected on.
        url: String,
    },

    /// The redirected share page carried no `surl` short-code.
    #[error(
        "short URL extraction failed for {url}\n  Suggestion: The link may have been removed or the session cookie is not logged in"
    )]
    ShortUrlMissing {
        /// Final share page URL.
        url: String,
    },

    /// The listing API returned a bad status, a non-zero errno or no files.
    #[error("share listing failed: {reason}\n  Suggestion: {suggestion}")]
    ListingError {
        /// What was wrong with the listing response.
        reason: String,
        /// Platform `errno`, when one was returned.
        errno: Option<i64>,
        /// How to fix the issue.
        suggestion: String,
    },

    /// No direct content-delivery link could be determined.
    #[error("direct link extraction failed ({strategy}): {reason}")]
    DirectLinkMissing {
        /// Strategy that failed.
        strategy: &'static str,
        /// What was missing.
        reason: String,
    },

    /// The page did not contain the download-URL assignment.
    #[error(
        "download URL pattern not found in {url}\n  Suggestion: The page structure changed; switch to another resolution strategy"
    )]
    ScrapePatternNotFound {
        /// Page that was scraped.
        url: String,
    },

    /// The relay service reported a failure.
    #[error("relay API error: {message}")]
    UpstreamApiError {
        /// Message reported by (or derived from) the relay.
        message: String,
    },

    /// Network-level failure after retries.
    #[error("network error requesting {url}: {message}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying error text.
        message: String,
    },

    /// Request timed out after retries.
    #[error("timeout requesting {url}")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// Strategy could not be set up (HTTP client, credentials).
    #[error("{strategy} resolver unavailable: {reason}\n  Suggestion: {suggestion}")]
    Setup {
        /// Strategy being constructed.
        strategy: String,
        /// What failed.
        reason: String,
        /// How to fix the issue.
        suggestion: String,
    },
}

impl ResolveError {
    /// Creates a `TokenExtractionFailed` error.
    #[must_use]
    pub fn token_missing(token: &'static str, url: &str) -> Self {
        Self::TokenExtractionFailed {
            token,
            url: url.to_string(),
        }
    }

    /// Creates a `ShortUrlMissing` error.
    #[must_use]
    pub fn short_url_missing(url: &str) -> Self {
        Self::ShortUrlMissing {
            url: url.to_string(),
        }
    }

    /// Creates a `ListingError` for a non-200 listing response.
    #[must_use]
    pub fn listing_status(status: u16) -> Self {
        Self::ListingError {
            reason: format!("listing API returned HTTP {status}"),
            errno: None,
            suggestion: "Retry later; the platform may be throttling requests".to_string(),
        }
    }

    /// Creates a `ListingError` for a body that is not a listing.
    #[must_use]
    pub fn listing_malformed(detail: &str) -> Self {
        Self::ListingError {
            reason: format!("listing response is not valid JSON: {detail}"),
            errno: None,
            suggestion: "The listing API contract may have changed; try the html-scrape strategy"
                .to_string(),
        }
    }

    /// Creates a `ListingError` for a non-zero errno or an empty file list.
    #[must_use]
    pub fn listing_rejected(errno: i64, message: Option<&str>) -> Self {
        let reason = if errno == 0 {
            "listing contains no files".to_string()
        } else {
            match message {
                Some(message) => format!("platform errno {errno}: {message}"),
                None => format!("platform errno {errno}"),
            }
        };
        Self::ListingError {
            reason,
            errno: Some(errno),
            suggestion: "Check that the share still exists and the session cookie is valid"
                .to_string(),
        }
    }

    /// Creates a `DirectLinkMissing` error.
    #[must_use]
    pub fn direct_link_missing(strategy: &'static str, reason: &str) -> Self {
        Self::DirectLinkMissing {
            strategy,
            reason: reason.to_string(),
        }
    }

    /// Creates a `ScrapePatternNotFound` error.
    #[must_use]
    pub fn scrape_pattern_not_found(url: &str) -> Self {
        Self::ScrapePatternNotFound {
            url: url.to_string(),
        }
    }

    /// Creates an `UpstreamApiError`.
    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamApiError {
            message: message.into(),
        }
    }

    /// Maps a reqwest transport error.
    #[must_use]
    pub fn transport(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }

    /// Creates a `Setup` error.
    #[must_use]
    pub fn setup(strategy: &str, reason: &str, suggestion: &str) -> Self {
        Self::Setup {
            strategy: strategy.to_string(),
            reason: reason.to_string(),
            suggestion: suggestion.to_string(),
        }
    }

    /// The failure category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLink(_) => ErrorKind::InvalidLink,
            Self::TokenExtractionFailed { .. } => ErrorKind::TokenExtractionFailed,
            Self::ShortUrlMissing { .. } => ErrorKind::ShortUrlMissing,
            Self::ListingError { .. } => ErrorKind::ListingError,
            Self::DirectLinkMissing { .. } => ErrorKind::DirectLinkMissing,
            Self::ScrapePatternNotFound { .. } => ErrorKind::ScrapePatternNotFound,
            Self::UpstreamApiError { .. } => ErrorKind::UpstreamApiError,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Setup { .. } => ErrorKind::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_rejected_empty_list_message() {
        let err = ResolveError::listing_rejected(0, None);
        assert!(err.to_string().contains("no files"));
        assert_eq!(err.kind(), ErrorKind::ListingError);
    }

    #[test]
    fn test_listing_rejected_errno_message() {
        let err = ResolveError::listing_rejected(-9, Some("share not found"));
        let msg = err.to_string();
        assert!(msg.contains("-9"));
        assert!(msg.contains("share not found"));
    }

    #[test]
    fn test_invalid_link_is_transparent() {
        let rejection = LinkRejection::unsupported_domain("https://example.com/x");
        let err = ResolveError::from(rejection.clone());
        assert_eq!(err.to_string(), rejection.to_string());
        assert_eq!(err.kind(), ErrorKind::InvalidLink);
    }

    #[test]
    fn test_token_missing_message_names_token() {
        let err = ResolveError::token_missing("jsToken", "https://www.terabox.app/sharing/link");
        assert!(err.to_string().contains("jsToken"));
        assert_eq!(err.kind(), ErrorKind::TokenExtractionFailed);
    }

    #[test]
    fn test_resolve_error_clone() {
        let err = ResolveError::upstream("quota exceeded");
        assert_eq!(err.to_string(), err.clone().to_string());
    }
}
