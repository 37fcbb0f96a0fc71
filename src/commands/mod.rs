//! CLI command handlers.

mod config;
mod fetch;
mod resolve;

pub use config::run_config_show_command;
pub use fetch::run_fetch_command;
pub use resolve::run_resolve_command;

use anyhow::anyhow;
use teradl_core::PipelineError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Token cancelled on Ctrl-C.
pub(crate) fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            child.cancel();
        }
    });
    token
}

/// Pairs the user-facing message with the detailed cause.
pub(crate) fn report_failure(error: PipelineError) -> anyhow::Error {
    anyhow!(
        "{} [{}]\n{error}",
        error.user_message(),
        error.kind().as_str()
    )
}
