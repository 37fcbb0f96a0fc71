//! Crate-wide failure categories.
//!
//! Each module keeps its own error enum; [`ErrorKind`] is the flat view a
//! collaborator (chat front-end, CLI exit path) branches on.

use std::fmt;

/// Category of a failed resolution or transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input was not a supported share link.
    InvalidLink,
    /// Session token missing from the share page.
    TokenExtractionFailed,
    /// Redirected share page had no short-code.
    ShortUrlMissing,
    /// Listing API returned an unusable response.
    ListingError,
    /// No direct link could be determined.
    DirectLinkMissing,
    /// Scrape pattern absent from the page.
    ScrapePatternNotFound,
    /// Relay service reported an error.
    UpstreamApiError,
    /// Content server returned a non-success status.
    DownloadFailed,
    /// Delivery sink rejected the artifact.
    DeliveryFailed,
    /// Transport failure.
    Network,
    /// A request or the whole job exceeded its time budget.
    Timeout,
    /// The job was cancelled.
    Cancelled,
    /// Local filesystem failure.
    Io,
    /// Missing or invalid configuration.
    Configuration,
}

impl ErrorKind {
    /// Stable snake_case identifier, used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidLink => "invalid_link",
            Self::TokenExtractionFailed => "token_extraction_failed",
            Self::ShortUrlMissing => "short_url_missing",
            Self::ListingError => "listing_error",
            Self::DirectLinkMissing => "direct_link_missing",
            Self::ScrapePatternNotFound => "scrape_pattern_not_found",
            Self::UpstreamApiError => "upstream_api_error",
            Self::DownloadFailed => "download_failed",
            Self::DeliveryFailed => "delivery_failed",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Io => "io",
            Self::Configuration => "configuration",
        }
    }

    /// Short message suitable for showing to the person who sent the link.
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InvalidLink => "That does not look like a supported share link.",
            Self::TokenExtractionFailed | Self::ShortUrlMissing => {
                "The share page could not be read. The link may be expired or private."
            }
            Self::ListingError => "The share does not contain a downloadable file.",
            Self::DirectLinkMissing | Self::ScrapePatternNotFound | Self::UpstreamApiError => {
                "No direct download link could be found for this share."
            }
            Self::DownloadFailed | Self::Network | Self::Io => {
                "The download failed. Please try again later."
            }
            Self::DeliveryFailed => "The file was downloaded but could not be delivered.",
            Self::Timeout => "The request took too long and was stopped.",
            Self::Cancelled => "The request was cancelled.",
            Self::Configuration => "The service is not configured correctly.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display_is_snake_case() {
        assert_eq!(ErrorKind::ShortUrlMissing.to_string(), "short_url_missing");
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_user_message_never_empty() {
        for kind in [
            ErrorKind::InvalidLink,
            ErrorKind::ListingError,
            ErrorKind::DownloadFailed,
            ErrorKind::Cancelled,
            ErrorKind::Configuration,
        ] {
            assert!(!kind.user_message().is_empty());
        }
    }
}
