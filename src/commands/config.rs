//! Config command handler: show effective configuration.

use anyhow::Result;
use teradl_core::LoadedConfig;

pub fn run_config_show_command(loaded: &LoadedConfig) -> Result<()> {
    let config = &loaded.config;
    let resolved_path = loaded.path.as_ref().map_or_else(
        || "not found (using defaults)".to_string(),
        |path| path.display().to_string(),
    );
    let fallback: Vec<&str> = config.fallback.iter().map(|kind| kind.as_str()).collect();
    let settings = config.transfer_settings();

    println!("config_path = {resolved_path}");
    println!("strategy = {}", config.strategy);
    println!("fallback = [{}]", fallback.join(", "));
    println!("staging_dir = {}", settings.staging_dir.display());
    println!("resolve_timeout_secs = {}", config.resolve_timeout_secs);
    println!("transfer_timeout_secs = {}", config.transfer_timeout_secs);
    println!("max_retries = {}", config.max_retries);
    println!("preflight = {}", config.preflight);
    println!("credentials = {:?}", config.credentials);
    println!("relay = {:?}", config.relay);

    Ok(())
}
