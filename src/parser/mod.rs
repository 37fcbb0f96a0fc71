//! Input parsing: deciding whether user text is a supported share link.
//!
//! - [`validate`] - classify text as a [`ShareLink`] or a [`LinkRejection`]
//! - [`extract_surl_from_url`] - read the `surl` short-code from a URL query

mod error;
mod share_link;

pub use error::{LinkRejection, MAX_LINK_LENGTH};
pub use share_link::{
    SHARE_DOMAIN_PATTERNS, ShareLink, extract_surl_from_url, is_supported_share_host, validate,
};
