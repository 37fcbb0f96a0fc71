//! Error types for the transfer pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::delivery::DeliveryError;
use crate::error::ErrorKind;

/// Errors that can occur while staging and delivering a resolved file.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The content server answered the download request with a non-success status.
    #[error(
        "HTTP {status} downloading {url}\n  Suggestion: Direct links expire quickly; resolve the share again"
    )]
    DownloadFailed {
        /// Direct link being downloaded.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Network-level error (DNS, connection reset, TLS, body read).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// Direct link being downloaded.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timed out.
    #[error("timeout downloading {url}")]
    Timeout {
        /// Direct link being downloaded.
        url: String,
    },

    /// Staging filesystem error.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The direct link is not a valid URL.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The delivery sink failed.
    #[error("delivery failed: {0}")]
    DeliveryFailed(#[from] DeliveryError),

    /// The job was cancelled while streaming.
    #[error("transfer cancelled after {bytes_written} bytes")]
    Cancelled {
        /// Bytes staged before cancellation.
        bytes_written: u64,
    },

    /// The download client could not be built.
    #[error("download client unavailable: {reason}")]
    ClientBuild {
        /// What failed.
        reason: String,
    },
}

impl TransferError {
    /// Maps a reqwest error to `Timeout` or `Network`.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates a `DownloadFailed` error.
    pub fn download_failed(url: impl Into<String>, status: u16) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The failure category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            Self::Network { .. } => ErrorKind::Network,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Io { .. } => ErrorKind::Io,
            Self::InvalidUrl { .. } => ErrorKind::DownloadFailed,
            Self::DeliveryFailed(_) => ErrorKind::DeliveryFailed,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::ClientBuild { .. } => ErrorKind::Configuration,
        }
    }
}
