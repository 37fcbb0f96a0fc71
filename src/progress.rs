//! Progress bar for `fetch`, driven by the pipeline's progress updates.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use teradl_core::{DeliveryError, DeliverySink, DirectorySink, JobState, ProgressUpdate};

const BAR_TEMPLATE: &str =
    "{spinner} {msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg} {bytes} ({bytes_per_sec})";

/// Writes into a directory and mirrors job progress on the terminal.
pub(crate) struct ProgressSink {
    inner: DirectorySink,
    bar: Option<ProgressBar>,
}

impl ProgressSink {
    /// `show_bar` false delivers silently (quiet mode, non-terminal output).
    pub(crate) fn new(output_dir: impl Into<PathBuf>, show_bar: bool) -> Self {
        let bar = show_bar.then(|| spinner(ProgressDrawTarget::stderr()));
        Self {
            inner: DirectorySink::new(output_dir),
            bar,
        }
    }

    pub(crate) fn delivered(&self) -> Vec<PathBuf> {
        self.inner.delivered()
    }

    pub(crate) fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

#[async_trait]
impl DeliverySink for ProgressSink {
    async fn deliver_file(&self, path: &Path, display_name: &str) -> Result<(), DeliveryError> {
        self.inner.deliver_file(path, display_name).await
    }

    async fn deliver_thumbnail(&self, image_url: &str) -> Result<(), DeliveryError> {
        self.inner.deliver_thumbnail(image_url).await
    }

    fn report_progress(&self, update: ProgressUpdate) {
        let Some(bar) = &self.bar else {
            return;
        };
        // The size is only known once the stream opens, so any update may
        // be the first to carry it.
        if bar.length().is_none()
            && let Some(total) = update.total
        {
            bar.set_length(total);
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
        }
        match update.state {
            JobState::Pending => {
                bar.set_message("downloading");
                bar.enable_steady_tick(std::time::Duration::from_millis(100));
            }
            JobState::Downloading => bar.set_position(update.bytes_written),
            JobState::Uploading => {
                bar.set_position(update.bytes_written);
                bar.set_message("delivering");
            }
            JobState::Done | JobState::Failed => bar.finish_and_clear(),
        }
    }
}

/// Spinner until the total size is known.
fn spinner(target: ProgressDrawTarget) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(None, target);
    bar.set_style(
        ProgressStyle::with_template(SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar
}
