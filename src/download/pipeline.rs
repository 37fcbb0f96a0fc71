//! Transfer pipeline: stage a resolved file locally, hand it to a delivery
//! sink, and delete the staged copy on every exit path.
//!
//! Each job stages under `<staging_dir>/job-<uuid>/<sanitized name>`, so
//! concurrent jobs never collide even when the remote files share a name.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::client::{PreflightInfo, TransferClient, stream_to_file};
use super::constants::{
    CONNECT_TIMEOUT_SECS, JOB_DIR_PREFIX, PROGRESS_STEP_BYTES, READ_TIMEOUT_SECS,
};
use super::error::TransferError;
use super::filename::{name_from_url, sanitize_filename};
use crate::delivery::{DeliverySink, ProgressUpdate};
use crate::resolver::ResolvedFile;
use crate::retry::RetryPolicy;
use crate::user_agent::BROWSER_USER_AGENT;

/// Lifecycle of a transfer job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Created, nothing fetched yet.
    Pending,
    /// Streaming bytes into staging.
    Downloading,
    /// Handing the staged file to the sink.
    Uploading,
    /// Delivered.
    Done,
    /// Failed or cancelled.
    Failed,
}

impl JobState {
    /// True for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// One in-flight download.
#[derive(Debug, Clone)]
pub struct TransferJob {
    id: Uuid,
    source_url: String,
    destination: PathBuf,
    bytes_written: u64,
    total: Option<u64>,
    state: JobState,
}

impl TransferJob {
    /// Creates a pending job staging `file_name` under a fresh job directory.
    #[must_use]
    pub fn new(source_url: &str, staging_dir: &Path, file_name: &str) -> Self {
        let id = Uuid::new_v4();
        let destination = staging_dir
            .join(format!("{JOB_DIR_PREFIX}{id}"))
            .join(sanitize_filename(file_name));
        Self {
            id,
            source_url: source_url.to_string(),
            destination,
            bytes_written: 0,
            total: None,
            state: JobState::Pending,
        }
    }

    /// Staging path of the artifact.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Directory owned exclusively by this job.
    #[must_use]
    pub fn job_dir(&self) -> &Path {
        self.destination.parent().unwrap_or(&self.destination)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    fn update(&self) -> ProgressUpdate {
        ProgressUpdate {
            job_id: self.id,
            state: self.state,
            bytes_written: self.bytes_written,
            total: self.total,
        }
    }
}

/// Removes a job's staging directory when dropped.
///
/// Covers cancellation and timeouts, where the pipeline future is dropped
/// before it can clean up itself.
#[derive(Debug)]
struct StagedArtifact {
    dir: PathBuf,
    armed: bool,
}

impl StagedArtifact {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            armed: true,
        }
    }

    async fn cleanup(mut self) {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => debug!(dir = %self.dir.display(), "staging directory removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.dir.display(), error = %e, "failed to remove staging directory"),
        }
        self.armed = false;
    }
}

impl Drop for StagedArtifact {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }
}

/// Summary of a delivered transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    /// Job id.
    pub job_id: Uuid,
    /// Name the artifact was delivered under.
    pub file_name: String,
    /// Bytes streamed.
    pub bytes_written: u64,
}

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Root of per-job staging directories.
    pub staging_dir: PathBuf,
    /// Content-server connect timeout.
    pub connect_timeout: Duration,
    /// Idle timeout between body chunks.
    pub read_timeout: Duration,
    /// Retry policy for pre-flight and opening the stream.
    pub retry: RetryPolicy,
    /// User-Agent for content-server requests.
    pub user_agent: String,
    /// Whether to HEAD the direct link before streaming.
    pub preflight: bool,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir().join("teradl"),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            preflight: true,
        }
    }
}

/// Streams resolved files through local staging into a [`DeliverySink`].
#[derive(Debug, Clone)]
pub struct TransferPipeline {
    client: TransferClient,
    settings: TransferSettings,
}

impl TransferPipeline {
    /// Creates the pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::ClientBuild`] when the HTTP client cannot be built.
    pub fn new(settings: TransferSettings) -> Result<Self, TransferError> {
        let client = TransferClient::new(
            settings.connect_timeout,
            settings.read_timeout,
            &settings.user_agent,
            settings.retry.clone(),
        )?;
        Ok(Self { client, settings })
    }

    /// HEADs the direct link and fills in name and size the strategy could
    /// not provide. Failure is logged and tolerated.
    #[instrument(skip(self, file), fields(file = file.file_name()))]
    pub async fn preflight(&self, file: &mut ResolvedFile) -> Option<PreflightInfo> {
        if !self.settings.preflight {
            return None;
        }
        match self.client.preflight(file.direct_link()).await {
            Ok(info) => {
                let name = info
                    .file_name
                    .clone()
                    .or_else(|| name_from_url(&info.final_url));
                file.refine(name, info.content_length);
                debug!(final_url = %info.final_url, size = file.size(), "pre-flight complete");
                Some(info)
            }
            Err(error) => {
                warn!(error = %error, "pre-flight failed; continuing with resolved metadata");
                None
            }
        }
    }

    /// Downloads `file` into a job-unique staging path, delivers it to
    /// `sink`, and removes the staging directory whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the first [`TransferError`] hit while downloading or delivering.
    #[instrument(skip(self, file, sink, cancel), fields(file = file.file_name()))]
    pub async fn transfer(
        &self,
        file: &ResolvedFile,
        sink: &dyn DeliverySink,
        cancel: &CancellationToken,
    ) -> Result<TransferReport, TransferError> {
        let mut job = TransferJob::new(
            file.direct_link(),
            &self.settings.staging_dir,
            file.file_name(),
        );
        let artifact = StagedArtifact::new(job.job_dir());
        sink.report_progress(job.update());

        let outcome = self.run_job(&mut job, file, sink, cancel).await;
        artifact.cleanup().await;

        match outcome {
            Ok(()) => {
                job.state = JobState::Done;
                sink.report_progress(job.update());
                info!(job_id = %job.id, bytes = job.bytes_written, "transfer complete");
                Ok(TransferReport {
                    job_id: job.id,
                    file_name: file.file_name().to_string(),
                    bytes_written: job.bytes_written,
                })
            }
            Err(error) => {
                job.state = JobState::Failed;
                sink.report_progress(job.update());
                warn!(job_id = %job.id, error = %error, "transfer failed");
                Err(error)
            }
        }
    }

    async fn run_job(
        &self,
        job: &mut TransferJob,
        file: &ResolvedFile,
        sink: &dyn DeliverySink,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError> {
        let job_dir = job.job_dir().to_path_buf();
        tokio::fs::create_dir_all(&job_dir)
            .await
            .map_err(|e| TransferError::io(&job_dir, e))?;

        let response = tokio::select! {
            () = cancel.cancelled() => return Err(TransferError::Cancelled { bytes_written: 0 }),
            response = self.client.open(&job.source_url) => response?,
        };
        job.total = response
            .content_length()
            .or_else(|| (file.size_bytes() > 0).then_some(file.size_bytes()));
        job.state = JobState::Downloading;
        sink.report_progress(job.update());

        let mut last_reported = 0;
        let template = job.update();
        let bytes_written = stream_to_file(
            response,
            &job.source_url,
            &job.destination,
            cancel,
            |written| {
                if written - last_reported >= PROGRESS_STEP_BYTES {
                    last_reported = written;
                    sink.report_progress(ProgressUpdate {
                        bytes_written: written,
                        ..template
                    });
                }
            },
        )
        .await?;
        job.bytes_written = bytes_written;
        debug!(path = %job.destination.display(), bytes = bytes_written, "staged");

        job.state = JobState::Uploading;
        sink.report_progress(job.update());
        sink.deliver_file(&job.destination, file.file_name()).await?;
        Ok(())
    }
}
