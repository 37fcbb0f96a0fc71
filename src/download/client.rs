//! HTTP client for content servers.
//!
//! Provides the redirect-following HEAD pre-flight and the streaming GET used
//! by the transfer pipeline. Only opening the stream is retried; a body that
//! fails mid-way fails the job.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_LENGTH};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use super::constants::WRITE_CHUNK_SIZE;
use super::error::TransferError;
use super::filename::parse_content_disposition;
use crate::net::build_client_with_fallback;
use crate::retry::RetryPolicy;

/// What a HEAD pre-flight learned about a direct link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreflightInfo {
    /// URL after following redirects.
    pub final_url: String,
    /// Name from `Content-Disposition`, if sent.
    pub file_name: Option<String>,
    /// `Content-Length`, if sent.
    pub content_length: Option<u64>,
}

/// Content-server client shared by all transfer jobs.
#[derive(Debug, Clone)]
pub struct TransferClient {
    client: Client,
    retry: RetryPolicy,
}

impl TransferClient {
    /// Builds the client.
    ///
    /// `read_timeout` bounds the idle time between body chunks, not the whole
    /// transfer.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ClientBuild`] when construction fails.
    pub fn new(
        connect_timeout: Duration,
        read_timeout: Duration,
        user_agent: &str,
        retry: RetryPolicy,
    ) -> Result<Self, TransferError> {
        let client = build_client_with_fallback("transfer", || {
            Client::builder()
                .connect_timeout(connect_timeout)
                .read_timeout(read_timeout)
                .user_agent(user_agent)
                .gzip(true)
        })
        .map_err(|reason| TransferError::ClientBuild { reason })?;
        Ok(Self { client, retry })
    }

    /// HEADs `url`, following redirects.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::DownloadFailed`] for a non-success status and
    /// transport errors otherwise.
    #[instrument(level = "debug", skip(self))]
    pub async fn preflight(&self, url: &str) -> Result<PreflightInfo, TransferError> {
        let response = self
            .retry
            .send("preflight", || self.client.head(url))
            .await
            .map_err(|e| TransferError::transport(url, e))?;
        if !response.status().is_success() {
            return Err(TransferError::download_failed(
                url,
                response.status().as_u16(),
            ));
        }
        let headers = response.headers();
        Ok(PreflightInfo {
            final_url: response.url().to_string(),
            file_name: headers
                .get(CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_disposition),
            content_length: headers
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok()),
        })
    }

    /// Opens a streaming GET on `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidUrl`] for an unparseable URL,
    /// [`TransferError::DownloadFailed`] for a non-success status, and
    /// transport errors otherwise.
    pub async fn open(&self, url: &str) -> Result<reqwest::Response, TransferError> {
        let parsed = Url::parse(url).map_err(|_| TransferError::InvalidUrl {
            url: url.to_string(),
        })?;
        let response = self
            .retry
            .send("download", || self.client.get(parsed.clone()))
            .await
            .map_err(|e| TransferError::transport(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::download_failed(url, status.as_u16()));
        }
        debug!(status = status.as_u16(), length = ?response.content_length(), "download stream opened");
        Ok(response)
    }
}

/// Streams a response body to `file_path` in fixed-size writes.
///
/// `on_progress` receives the running byte count after each network chunk.
/// Returns bytes written.
///
/// # Errors
///
/// Returns [`TransferError::Cancelled`] when `cancel` fires, and network or
/// IO errors otherwise.
pub(crate) async fn stream_to_file<F>(
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<u64, TransferError>
where
    F: FnMut(u64),
{
    let file = File::create(file_path)
        .await
        .map_err(|e| TransferError::io(file_path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => {
                return Err(TransferError::Cancelled { bytes_written });
            }
            next = stream.next() => next,
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk.map_err(|e| TransferError::transport(url, e))?;

        for piece in chunk.chunks(WRITE_CHUNK_SIZE) {
            writer
                .write_all(piece)
                .await
                .map_err(|e| TransferError::io(file_path, e))?;
        }
        bytes_written += chunk.len() as u64;
        on_progress(bytes_written);
    }

    writer
        .flush()
        .await
        .map_err(|e| TransferError::io(file_path, e))?;

    Ok(bytes_written)
}
