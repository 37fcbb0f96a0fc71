//! Delivery sink contract and a filesystem implementation.
//!
//! The chat front-end (or any other consumer) implements [`DeliverySink`] to
//! receive the staged artifact. The pipeline deletes the staged file after
//! `deliver_file` returns, so a sink must copy or fully consume it before
//! returning.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::download::JobState;
use crate::download::filename::sanitize_filename;

/// Errors reported by a delivery sink.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The sink refused the artifact (size limits, closed conversation, ...).
    #[error("delivery rejected for {display_name}: {reason}")]
    Rejected {
        /// Name the artifact was offered under.
        display_name: String,
        /// Why the sink refused it.
        reason: String,
    },

    /// Filesystem failure while delivering.
    #[error("IO error delivering to {path}: {source}")]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl DeliveryError {
    /// Creates a `Rejected` error.
    pub fn rejected(display_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            display_name: display_name.into(),
            reason: reason.into(),
        }
    }
}

/// One progress notification for a transfer job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Job the update belongs to.
    pub job_id: Uuid,
    /// Current job state.
    pub state: JobState,
    /// Bytes written to staging so far.
    pub bytes_written: u64,
    /// Expected total, when the server reported one.
    pub total: Option<u64>,
}

/// Receives finished artifacts and progress from the transfer pipeline.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Hands over the fully written staged file under its human-readable name.
    async fn deliver_file(&self, path: &Path, display_name: &str) -> Result<(), DeliveryError>;

    /// Offers a thumbnail preview URL. Failure is never fatal to the job.
    async fn deliver_thumbnail(&self, _image_url: &str) -> Result<(), DeliveryError> {
        Ok(())
    }

    /// Observes job progress. Called frequently; must not block.
    fn report_progress(&self, _update: ProgressUpdate) {}
}

/// Copies delivered artifacts into a directory.
///
/// Existing files are never overwritten; a numeric suffix is added instead.
#[derive(Debug)]
pub struct DirectorySink {
    output_dir: PathBuf,
    delivered: Mutex<Vec<PathBuf>>,
}

impl DirectorySink {
    /// Creates a sink writing into `output_dir` (created on first delivery).
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Paths written so far, in delivery order.
    #[must_use]
    pub fn delivered(&self) -> Vec<PathBuf> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DeliverySink for DirectorySink {
    async fn deliver_file(&self, path: &Path, display_name: &str) -> Result<(), DeliveryError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| DeliveryError::Io {
                path: self.output_dir.clone(),
                source,
            })?;

        let mut source = tokio::fs::File::open(path)
            .await
            .map_err(|source| DeliveryError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let (target, mut output) = create_unique(&self.output_dir, display_name).await?;

        let copied = async {
            let bytes = tokio::io::copy(&mut source, &mut output).await?;
            output.flush().await?;
            Ok::<u64, std::io::Error>(bytes)
        }
        .await;
        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(source) => {
                drop(output);
                let _ = tokio::fs::remove_file(&target).await;
                return Err(DeliveryError::Io {
                    path: target,
                    source,
                });
            }
        };
        info!(path = %target.display(), bytes, "artifact delivered");

        if let Ok(mut guard) = self.delivered.lock() {
            guard.push(target);
        }
        Ok(())
    }

    async fn deliver_thumbnail(&self, image_url: &str) -> Result<(), DeliveryError> {
        debug!(url = image_url, "thumbnail available");
        Ok(())
    }
}

/// Creates the first free path for `name` in `dir`. Creation is exclusive,
/// so concurrent deliveries of the same name never share a target.
async fn create_unique(
    dir: &Path,
    name: &str,
) -> Result<(PathBuf, tokio::fs::File), DeliveryError> {
    let mut last_error = None;
    for candidate in candidate_paths(dir, name) {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                last_error = Some((candidate, error));
            }
            Err(source) => {
                return Err(DeliveryError::Io {
                    path: candidate,
                    source,
                });
            }
        }
    }
    let (path, source) = last_error.unwrap_or_else(|| {
        (
            dir.to_path_buf(),
            std::io::Error::other("no candidate file name available"),
        )
    });
    Err(DeliveryError::Io { path, source })
}

/// `name`, then `stem_2.ext`, `stem_3.ext`, ..., then a random suffix.
fn candidate_paths(dir: &Path, name: &str) -> impl Iterator<Item = PathBuf> {
    let name = sanitize_filename(name);
    let (stem, ext) = match name.rfind('.') {
        Some(pos) if pos > 0 => (name[..pos].to_string(), name[pos..].to_string()),
        _ => (name.clone(), String::new()),
    };
    let dir = dir.to_path_buf();
    let first = dir.join(&name);
    let last = dir.join(format!("{stem}_{}{ext}", Uuid::new_v4().simple()));
    std::iter::once(first)
        .chain((2..10_000).map(move |i| dir.join(format!("{stem}_{i}{ext}"))))
        .chain(std::iter::once(last))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_candidate_paths_order() {
        let dir = Path::new("/out");
        let mut candidates = candidate_paths(dir, "clip.mp4");
        assert_eq!(candidates.next().unwrap(), dir.join("clip.mp4"));
        assert_eq!(candidates.next().unwrap(), dir.join("clip_2.mp4"));
        assert_eq!(candidates.next().unwrap(), dir.join("clip_3.mp4"));
    }

    #[test]
    fn test_candidate_paths_without_extension() {
        let mut candidates = candidate_paths(Path::new("/out"), ".env");
        assert_eq!(candidates.next().unwrap(), Path::new("/out/.env"));
        assert_eq!(candidates.next().unwrap(), Path::new("/out/.env_2"));
    }

    #[test]
    fn test_candidate_paths_sanitize_traversal() {
        let dir = Path::new("/out");
        for path in candidate_paths(dir, "../../etc/passwd").take(3) {
            assert_eq!(path.parent().unwrap(), dir);
        }
    }

    #[tokio::test]
    async fn test_create_unique_skips_existing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"a").unwrap();
        std::fs::write(dir.path().join("clip_2.mp4"), b"b").unwrap();
        let (path, _file) = create_unique(dir.path(), "clip.mp4").await.unwrap();
        assert_eq!(path, dir.path().join("clip_3.mp4"));
    }

    #[tokio::test]
    async fn test_directory_sink_copies_and_keeps_source() {
        let staging = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let staged = staging.path().join("payload");
        std::fs::write(&staged, b"bytes").unwrap();

        let sink = DirectorySink::new(out.path().join("nested"));
        sink.deliver_file(&staged, "movie.mp4").await.unwrap();
        sink.deliver_file(&staged, "movie.mp4").await.unwrap();

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].file_name().unwrap(), "movie.mp4");
        assert_eq!(delivered[1].file_name().unwrap(), "movie_2.mp4");
        assert_eq!(std::fs::read(&delivered[1]).unwrap(), b"bytes");
        assert!(staged.exists());
    }

    #[tokio::test]
    async fn test_directory_sink_missing_source_is_io_error() {
        let out = TempDir::new().unwrap();
        let sink = DirectorySink::new(out.path());
        let err = sink
            .deliver_file(Path::new("/nonexistent/teradl/staged"), "x.bin")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Io { .. }));
    }
}
