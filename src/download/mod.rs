//! Transfer pipeline: streams a resolved direct link into job-unique local
//! staging and hands the artifact to a delivery sink.
//!
//! # Features
//!
//! - Streaming downloads in fixed 8 KiB writes (memory-bounded for large files)
//! - Redirect-following HEAD pre-flight that fills in missing name/size
//! - Per-job staging directories, removed on success, failure, cancellation
//!   and timeout
//! - Progress reporting through the sink
//!
//! # Example
//!
//! ```no_run
//! use teradl_core::delivery::DirectorySink;
//! use teradl_core::download::{TransferPipeline, TransferSettings};
//! use teradl_core::resolver::ResolvedFile;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = TransferPipeline::new(TransferSettings::default())?;
//! let mut file = ResolvedFile::provisional("https://cdn.example.com/file/abc")?;
//! pipeline.preflight(&mut file).await;
//! let sink = DirectorySink::new("./downloads");
//! let report = pipeline.transfer(&file, &sink, &CancellationToken::new()).await?;
//! println!("delivered {} ({} bytes)", report.file_name, report.bytes_written);
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
pub mod filename;
mod pipeline;

pub use client::{PreflightInfo, TransferClient};
pub use error::TransferError;
pub use pipeline::{JobState, TransferJob, TransferPipeline, TransferReport, TransferSettings};
