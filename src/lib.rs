//! teradl core library
//!
//! Resolves TeraBox share links into direct download URLs and streams the
//! file through a staging area into a delivery sink.
//!
//! # Architecture
//!
//! - [`parser`] - share-link validation and short-code extraction
//! - [`resolver`] - interchangeable resolution strategies and their chain
//! - [`download`] - transfer pipeline with per-job staging and cleanup
//! - [`delivery`] - the sink a front-end implements to receive files
//! - [`orchestrator`] - validate, resolve, transfer, deliver for one request
//! - [`config`] - TOML configuration with environment overrides
//! - [`auth`] - Netscape cookie files for the cookie-file strategy
//! - [`retry`] - retry classification and backoff
//! - [`error`] - the failure categories shown to users

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod delivery;
pub mod download;
pub mod error;
mod net;
pub mod orchestrator;
pub mod parser;
pub mod resolver;
pub mod retry;
pub mod size;
mod user_agent;

// Re-export commonly used types
pub use config::{AppConfig, LoadedConfig};
pub use delivery::{DeliveryError, DeliverySink, DirectorySink, ProgressUpdate};
pub use download::{JobState, TransferError, TransferPipeline, TransferReport, TransferSettings};
pub use error::ErrorKind;
pub use orchestrator::{Orchestrator, Outcome, PipelineError};
pub use parser::{LinkRejection, ShareLink, validate};
pub use resolver::{ResolveError, ResolvedFile, Resolver, ResolverChain, StrategyKind};
pub use retry::RetryPolicy;
pub use size::format_size;
pub use user_agent::BROWSER_USER_AGENT;
