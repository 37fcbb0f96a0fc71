//! `teradl resolve`: print what a share link points to.

use anyhow::Result;
use teradl_core::{AppConfig, Orchestrator};
use tracing::debug;

use super::{ctrl_c_token, report_failure};

pub async fn run_resolve_command(config: &AppConfig, link: &str, json: bool) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config).map_err(report_failure)?;
    debug!(strategy = orchestrator.strategy_name(), "resolver ready");

    let cancel = ctrl_c_token();
    let file = orchestrator
        .resolve(link, &cancel)
        .await
        .map_err(report_failure)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&file)?);
    } else {
        println!("file_name = {}", file.file_name());
        println!("size = {} ({} bytes)", file.size(), file.size_bytes());
        println!("direct_link = {}", file.direct_link());
        if let Some(thumbnail) = file.thumbnail_url() {
            println!("thumbnail = {thumbnail}");
        }
    }
    Ok(())
}
