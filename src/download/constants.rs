//! Constants for the transfer pipeline.

/// Default HTTP connect timeout for content servers (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle read timeout between body chunks (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Bytes written to the staging file per write call.
pub const WRITE_CHUNK_SIZE: usize = 8 * 1024;

/// Minimum bytes between two `Downloading` progress reports.
pub const PROGRESS_STEP_BYTES: u64 = 1024 * 1024;

/// Prefix of per-job staging directories.
pub const JOB_DIR_PREFIX: &str = "job-";
