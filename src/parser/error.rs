//! Rejection outcomes for share-link validation.

use thiserror::Error;

/// Maximum input length accepted as a candidate link.
pub const MAX_LINK_LENGTH: usize = 2000;

/// Why a piece of text was not accepted as a share link.
///
/// Rejection is an expected outcome of validation, not an exceptional one, so
/// it carries enough context for a user-facing reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkRejection {
    /// The text does not mention any known share domain.
    #[error(
        "unsupported link '{preview}': not a known TeraBox share domain\n  Suggestion: Send a share link from terabox.com or one of its mirrors"
    )]
    UnsupportedDomain {
        /// Truncated input for display.
        preview: String,
    },

    /// The text mentions a share domain but is not a usable share URL.
    #[error("malformed share link '{url}': {reason}\n  Suggestion: {suggestion}")]
    MalformedUrl {
        /// The offending candidate URL.
        url: String,
        /// What is wrong with it.
        reason: String,
        /// How to fix the issue.
        suggestion: String,
    },
}

impl LinkRejection {
    /// Creates an `UnsupportedDomain` rejection, truncating long input.
    #[must_use]
    pub fn unsupported_domain(input: &str) -> Self {
        Self::UnsupportedDomain {
            preview: preview(input),
        }
    }

    /// Creates a `MalformedUrl` rejection for an unparseable URL.
    #[must_use]
    pub fn malformed(url: &str, reason: &str) -> Self {
        Self::MalformedUrl {
            url: preview(url),
            reason: reason.to_string(),
            suggestion: "Copy the full share link including https://".to_string(),
        }
    }

    /// Creates a `MalformedUrl` rejection for a URL with no share short-code.
    #[must_use]
    pub fn missing_short_code(url: &str) -> Self {
        Self::MalformedUrl {
            url: preview(url),
            reason: "no share short-code in path (/s/1...) or `surl` parameter".to_string(),
            suggestion: "Send the share link itself, not the site home page".to_string(),
        }
    }

    /// Short reply text suitable for a chat message.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnsupportedDomain { .. } => "Please provide a valid TeraBox link.",
            Self::MalformedUrl { .. } => {
                "That looks like a TeraBox address, but not a share link I can open."
            }
        }
    }
}

fn preview(input: &str) -> String {
    const PREVIEW_CHARS: usize = 80;
    let trimmed = input.trim();
    if trimmed.chars().count() <= PREVIEW_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}
