//! End-to-end CLI tests for the teradl binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Runs the binary with an isolated config home and no credential env vars.
fn teradl(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("teradl").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.path())
        .env("HOME", home.path())
        .env_remove("TERADL_COOKIE")
        .env_remove("TERADL_COOKIE_FILE")
        .env_remove("TERADL_STRATEGY")
        .env_remove("TERADL_RELAY_ENDPOINT")
        .env_remove("TERADL_RELAY_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    teradl(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolve TeraBox share links"))
        .stdout(predicate::str::contains("fetch"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    teradl(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("teradl"));
}

#[test]
fn test_binary_without_subcommand_fails() {
    let home = TempDir::new().unwrap();
    teradl(&home).assert().failure();
}

#[test]
fn test_missing_cookie_is_reported_before_network() {
    let home = TempDir::new().unwrap();
    teradl(&home)
        .args(["resolve", "https://terabox.com/s/1abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("credentials.cookie"));
}

#[test]
fn test_unsupported_link_is_rejected() {
    let home = TempDir::new().unwrap();
    teradl(&home)
        .env("TERADL_COOKIE", "ndus=x")
        .args(["-q", "resolve", "https://example.com/file.zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_link"));
}

#[test]
fn test_explicit_config_file_is_used() {
    let home = TempDir::new().unwrap();
    let config_path = home.path().join("custom.toml");
    std::fs::write(
        &config_path,
        "strategy = \"html-scrape\"\nmax_retries = 2\nfallback = [\"relay-api\"]\n",
    )
    .unwrap();

    teradl(&home)
        .args(["--config", config_path.to_str().unwrap(), "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("strategy = html-scrape"))
        .stdout(predicate::str::contains("max_retries = 2"))
        .stdout(predicate::str::contains("fallback = [relay-api]"));
}

#[test]
fn test_unknown_config_key_is_rejected() {
    let home = TempDir::new().unwrap();
    let config_path = home.path().join("bad.toml");
    std::fs::write(&config_path, "strategy = \"html-scrape\"\nconcurrency = 4\n").unwrap();

    teradl(&home)
        .args(["--config", config_path.to_str().unwrap(), "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_strategy_flag_overrides_config() {
    let home = TempDir::new().unwrap();
    teradl(&home)
        .args(["--strategy", "html-scrape", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("strategy = html-scrape"));
}

#[test]
fn test_secrets_are_redacted_in_config_output() {
    let home = TempDir::new().unwrap();
    teradl(&home)
        .env("TERADL_COOKIE", "ndus=very-secret")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("<redacted>"))
        .stdout(predicate::str::contains("very-secret").not());
}
