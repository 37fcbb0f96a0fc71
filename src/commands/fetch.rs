//! `teradl fetch`: resolve, download and deliver into a directory.

use std::io::IsTerminal;
use std::path::Path;

use anyhow::Result;
use teradl_core::{AppConfig, Orchestrator};
use tracing::info;

use super::{ctrl_c_token, report_failure};
use crate::progress::ProgressSink;

pub async fn run_fetch_command(
    config: &AppConfig,
    link: &str,
    output: &Path,
    show_progress: bool,
) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config).map_err(report_failure)?;
    let sink = ProgressSink::new(output, show_progress && std::io::stderr().is_terminal());

    let cancel = ctrl_c_token();
    let result = orchestrator.process(link, &sink, &cancel).await;
    sink.finish();
    let outcome = result.map_err(report_failure)?;

    for path in sink.delivered() {
        println!("{}", path.display());
    }
    info!(
        job_id = %outcome.report.job_id,
        file = outcome.file.file_name(),
        size = outcome.file.size(),
        "fetch complete"
    );
    Ok(())
}
