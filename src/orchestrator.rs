//! Resolution orchestrator: the call contract consumed by a front-end.
//!
//! Takes raw text, validates it, runs the configured strategy (or chain),
//! then runs the transfer pipeline into the caller's sink. Resolution and
//! transfer are each bounded by a timeout and observe a cancellation token;
//! staging is cleaned up on every exit.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::AppConfig;
use crate::delivery::DeliverySink;
use crate::download::{TransferError, TransferPipeline, TransferReport};
use crate::error::ErrorKind;
use crate::parser::validate;
use crate::resolver::{ResolveError, ResolvedFile, Resolver, build_resolver_chain};

/// Errors surfaced to the front-end for one request.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Validation or resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Download or delivery failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// A stage exceeded its time budget.
    #[error("{stage} timed out after {}s", .after.as_secs())]
    TimedOut {
        /// `resolve` or `transfer`.
        stage: &'static str,
        /// Configured budget.
        after: Duration,
    },

    /// The orchestrator could not be built from configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// The failure category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Resolve(error) => error.kind(),
            Self::Transfer(error) => error.kind(),
            Self::Cancelled => ErrorKind::Cancelled,
            Self::TimedOut { .. } => ErrorKind::Timeout,
            Self::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Message suitable for the person who sent the link.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Resolve(ResolveError::InvalidLink(rejection)) => rejection.user_message(),
            other => other.kind().user_message(),
        }
    }
}

/// A delivered request.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// What the share resolved to (after pre-flight refinement).
    pub file: ResolvedFile,
    /// Transfer summary.
    pub report: TransferReport,
}

/// Owns the active strategy and the transfer pipeline.
pub struct Orchestrator {
    resolver: Arc<dyn Resolver>,
    pipeline: TransferPipeline,
    resolve_timeout: Duration,
    transfer_timeout: Duration,
}

impl Orchestrator {
    /// Assembles an orchestrator from parts.
    #[must_use]
    pub fn new(
        resolver: Arc<dyn Resolver>,
        pipeline: TransferPipeline,
        resolve_timeout: Duration,
        transfer_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            pipeline,
            resolve_timeout,
            transfer_timeout,
        }
    }

    /// Builds the configured strategy chain and pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] when settings are invalid and
    /// [`PipelineError::Resolve`] when the active strategy cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineError> {
        let settings = config
            .resolver_settings()
            .map_err(|e| PipelineError::Config(format!("{e:#}")))?;
        let chain = build_resolver_chain(config.strategy, &config.fallback, &settings)?;
        info!(strategies = ?chain.strategy_names(), "resolution strategies ready");
        let pipeline = TransferPipeline::new(config.transfer_settings())?;
        Ok(Self::new(
            Arc::new(chain),
            pipeline,
            config.resolve_timeout(),
            config.transfer_timeout(),
        ))
    }

    /// Name of the active strategy (or `chain`).
    #[must_use]
    pub fn strategy_name(&self) -> &str {
        self.resolver.name()
    }

    /// Validates `text` and resolves it, without transferring.
    ///
    /// # Errors
    ///
    /// Returns the validation or resolution error, [`PipelineError::TimedOut`]
    /// or [`PipelineError::Cancelled`].
    #[instrument(skip(self, text, cancel))]
    pub async fn resolve(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolvedFile, PipelineError> {
        let link = validate(text).map_err(ResolveError::from)?;
        info!(domain = link.domain(), short_code = link.short_code(), "resolving share");

        let resolution = tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(&link));
        tokio::select! {
            () = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = resolution => match result {
                Ok(resolved) => Ok(resolved?),
                Err(_) => Err(PipelineError::TimedOut {
                    stage: "resolve",
                    after: self.resolve_timeout,
                }),
            },
        }
    }

    /// Resolves `text` and delivers the file to `sink`.
    ///
    /// # Errors
    ///
    /// Returns the first failure from validation, resolution, download or
    /// delivery; no staged file remains afterwards.
    #[instrument(skip(self, text, sink, cancel))]
    pub async fn process(
        &self,
        text: &str,
        sink: &dyn DeliverySink,
        cancel: &CancellationToken,
    ) -> Result<Outcome, PipelineError> {
        let mut file = self.resolve(text, cancel).await?;

        if let Some(thumbnail) = file.thumbnail_url()
            && let Err(error) = sink.deliver_thumbnail(thumbnail).await
        {
            warn!(error = %error, "thumbnail delivery failed");
        }

        let transfer = async {
            self.pipeline.preflight(&mut file).await;
            let report = self.pipeline.transfer(&file, sink, cancel).await;
            (report, file)
        };
        let (report, file) = match tokio::time::timeout(self.transfer_timeout, transfer).await {
            Ok(done) => done,
            Err(_) => {
                return Err(PipelineError::TimedOut {
                    stage: "transfer",
                    after: self.transfer_timeout,
                });
            }
        };

        let report = report.map_err(|error| match error {
            TransferError::Cancelled { .. } => PipelineError::Cancelled,
            other => PipelineError::Transfer(other),
        })?;
        info!(
            file = report.file_name.as_str(),
            bytes = report.bytes_written,
            "request delivered"
        );
        Ok(Outcome { file, report })
    }

    /// Runs [`Orchestrator::process`] as an independent task.
    ///
    /// The caller keeps `cancel` (or a parent token) to stop the job when the
    /// conversation that issued it ends.
    pub fn spawn(
        self: &Arc<Self>,
        text: String,
        sink: Arc<dyn DeliverySink>,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<Outcome, PipelineError>> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.process(&text, sink.as_ref(), &cancel).await })
    }
}
