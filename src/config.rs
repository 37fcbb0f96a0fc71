//! Application configuration: TOML file, environment overrides, validation.
//!
//! Load order:
//! 1. `--config <path>` if given (must exist)
//! 2. `$XDG_CONFIG_HOME/teradl/config.toml`
//! 3. `$HOME/.config/teradl/config.toml`
//!
//! Then `TERADL_*` environment variables override secrets and the strategy.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use url::Url;

use crate::download::TransferSettings;
use crate::resolver::{
    DEFAULT_API_KEY_HEADER, HttpSettings, PlatformSettings, RelaySettings, ResolverSettings,
    StrategyKind,
};
use crate::retry::{DEFAULT_MAX_RETRIES, RetryPolicy};
use crate::user_agent::BROWSER_USER_AGENT;

/// Environment variable overriding `credentials.cookie`.
pub const ENV_COOKIE: &str = "TERADL_COOKIE";
/// Environment variable overriding `credentials.cookie_file`.
pub const ENV_COOKIE_FILE: &str = "TERADL_COOKIE_FILE";
/// Environment variable overriding `relay.api_key`.
pub const ENV_RELAY_API_KEY: &str = "TERADL_RELAY_API_KEY";
/// Environment variable overriding `relay.endpoint`.
pub const ENV_RELAY_ENDPOINT: &str = "TERADL_RELAY_ENDPOINT";
/// Environment variable overriding `strategy`.
pub const ENV_STRATEGY: &str = "TERADL_STRATEGY";

const DEFAULT_RESOLVE_TIMEOUT_SECS: u64 = 90;
const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DOWNLOAD_READ_TIMEOUT_SECS: u64 = 300;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Active resolution strategy.
    pub strategy: StrategyKind,
    /// Strategies tried, in order, after the active one fails.
    pub fallback: Vec<StrategyKind>,
    /// Root of per-job staging directories; defaults to the system temp dir.
    pub staging_dir: Option<PathBuf>,
    /// Upper bound on one resolution, in seconds.
    pub resolve_timeout_secs: u64,
    /// Upper bound on one transfer including delivery, in seconds.
    pub transfer_timeout_secs: u64,
    /// Attempts per HTTP call, including the first.
    pub max_retries: u32,
    /// HEAD the direct link before streaming.
    pub preflight: bool,
    /// HTTP timeouts.
    pub http: HttpConfig,
    /// Platform endpoints.
    pub platform: PlatformConfig,
    /// Platform session credentials.
    pub credentials: CredentialsConfig,
    /// Relay service.
    pub relay: RelayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            fallback: Vec::new(),
            staging_dir: None,
            resolve_timeout_secs: DEFAULT_RESOLVE_TIMEOUT_SECS,
            transfer_timeout_secs: DEFAULT_TRANSFER_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            preflight: true,
            http: HttpConfig::default(),
            platform: PlatformConfig::default(),
            credentials: CredentialsConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

/// `[http]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Connect timeout for every client.
    pub connect_timeout_secs: u64,
    /// Per-request timeout for resolver calls.
    pub request_timeout_secs: u64,
    /// Idle read timeout between download chunks.
    pub download_read_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            download_read_timeout_secs: DEFAULT_DOWNLOAD_READ_TIMEOUT_SECS,
        }
    }
}

/// `[platform]` section. Unset fields use the built-in platform defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformConfig {
    /// Listing API origin.
    pub api_base: Option<String>,
    /// `Host` header for page/API requests; an empty string disables it.
    pub host_header: Option<String>,
    /// Browser User-Agent.
    pub user_agent: Option<String>,
    /// Listing `app_id`.
    pub app_id: Option<String>,
    /// Origin share pages are fetched from instead of the link's host.
    pub share_origin: Option<String>,
}

/// `[credentials]` section.
#[derive(Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Raw `Cookie` header value.
    pub cookie: Option<String>,
    /// Netscape cookie export path.
    pub cookie_file: Option<PathBuf>,
}

impl fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .field("cookie_file", &self.cookie_file)
            .finish()
    }
}

/// `[relay]` section.
#[derive(Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Relay endpoint URL.
    pub endpoint: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Header carrying the API key.
    pub api_key_header: Option<String>,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_header", &self.api_key_header)
            .finish()
    }
}

/// Config plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// File the config was read from, if any.
    pub path: Option<PathBuf>,
    /// Effective configuration after environment overrides.
    pub config: AppConfig,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/teradl/config.toml`
/// 2. `$HOME/.config/teradl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("teradl").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("teradl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

impl AppConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending key on malformed TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid config file")
    }

    /// Reads a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("In config file {}", path.display()))
    }

    /// Loads the effective configuration: file, then environment, then the
    /// command-line strategy override, then validation.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit path does not exist, the file is
    /// invalid, or validation fails.
    pub fn load(
        explicit_path: Option<&Path>,
        strategy_override: Option<StrategyKind>,
    ) -> Result<LoadedConfig> {
        let (path, mut config) = match explicit_path {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file {} does not exist", path.display());
                }
                (Some(path.to_path_buf()), Self::from_file(path)?)
            }
            None => match resolve_default_config_path().filter(|p| p.exists()) {
                Some(path) => {
                    let config = Self::from_file(&path)?;
                    (Some(path), config)
                }
                None => (None, Self::default()),
            },
        };

        config.apply_env_overrides_from(|name| env::var(name).ok())?;
        if let Some(strategy) = strategy_override {
            config.strategy = strategy;
        }
        config.validate()?;
        Ok(LoadedConfig { path, config })
    }

    /// Applies `TERADL_*` overrides from `lookup`. Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if `TERADL_STRATEGY` names an unknown strategy.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(strategy) = get(ENV_STRATEGY) {
            self.strategy = strategy
                .parse()
                .map_err(|e: String| anyhow::anyhow!("Invalid {ENV_STRATEGY}: {e}"))?;
        }
        if let Some(cookie) = get(ENV_COOKIE) {
            self.credentials.cookie = Some(cookie);
        }
        if let Some(cookie_file) = get(ENV_COOKIE_FILE) {
            self.credentials.cookie_file = Some(PathBuf::from(cookie_file));
        }
        if let Some(endpoint) = get(ENV_RELAY_ENDPOINT) {
            self.relay.endpoint = Some(endpoint);
        }
        if let Some(api_key) = get(ENV_RELAY_API_KEY) {
            self.relay.api_key = Some(api_key);
        }
        Ok(())
    }

    /// Validates ranges, URLs and the active strategy's credentials.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        validate_range("resolve_timeout_secs", self.resolve_timeout_secs, 1, 3600)?;
        validate_range("transfer_timeout_secs", self.transfer_timeout_secs, 1, 86_400)?;
        validate_range("max_retries", u64::from(self.max_retries), 1, 10)?;
        validate_range("http.connect_timeout_secs", self.http.connect_timeout_secs, 1, 300)?;
        validate_range("http.request_timeout_secs", self.http.request_timeout_secs, 1, 3600)?;
        validate_range(
            "http.download_read_timeout_secs",
            self.http.download_read_timeout_secs,
            1,
            3600,
        )?;

        if let Some(api_base) = &self.platform.api_base {
            parse_http_url("platform.api_base", api_base)?;
        }
        if let Some(origin) = &self.platform.share_origin {
            parse_http_url("platform.share_origin", origin)?;
        }
        if let Some(endpoint) = &self.relay.endpoint {
            parse_http_url("relay.endpoint", endpoint)?;
        }

        match self.strategy {
            StrategyKind::CookieHeader => {
                if non_empty(self.credentials.cookie.as_deref()).is_none() {
                    bail!(
                        "Strategy `cookie-header` needs `credentials.cookie` (or {ENV_COOKIE})"
                    );
                }
            }
            StrategyKind::CookieFile => {
                if self.credentials.cookie_file.is_none() {
                    bail!(
                        "Strategy `cookie-file` needs `credentials.cookie_file` (or {ENV_COOKIE_FILE})"
                    );
                }
            }
            StrategyKind::HtmlScrape => {}
            StrategyKind::RelayApi => {
                if self.relay.endpoint.is_none() {
                    bail!("Strategy `relay-api` needs `relay.endpoint` (or {ENV_RELAY_ENDPOINT})");
                }
                if non_empty(self.relay.api_key.as_deref()).is_none() {
                    bail!("Strategy `relay-api` needs `relay.api_key` (or {ENV_RELAY_API_KEY})");
                }
            }
        }
        Ok(())
    }

    /// Retry policy for every HTTP call.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_retries)
    }

    /// Resolution timeout.
    #[must_use]
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Transfer timeout.
    #[must_use]
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    /// Settings for building resolution strategies.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured URL is invalid.
    pub fn resolver_settings(&self) -> Result<ResolverSettings> {
        let mut platform = PlatformSettings::default();
        if let Some(api_base) = &self.platform.api_base {
            platform.api_base = parse_http_url("platform.api_base", api_base)?;
        }
        if let Some(origin) = &self.platform.share_origin {
            platform.share_origin = Some(parse_http_url("platform.share_origin", origin)?);
        }
        if let Some(host) = &self.platform.host_header {
            platform.host_header = non_empty(Some(host.as_str())).map(str::to_string);
        }
        platform.user_agent = non_empty(self.platform.user_agent.as_deref())
            .unwrap_or(BROWSER_USER_AGENT)
            .to_string();
        if let Some(app_id) = non_empty(self.platform.app_id.as_deref()) {
            platform.app_id = app_id.to_string();
        }

        let relay = match (&self.relay.endpoint, non_empty(self.relay.api_key.as_deref())) {
            (Some(endpoint), Some(api_key)) => Some(RelaySettings {
                endpoint: parse_http_url("relay.endpoint", endpoint)?,
                api_key: api_key.to_string(),
                api_key_header: non_empty(self.relay.api_key_header.as_deref())
                    .unwrap_or(DEFAULT_API_KEY_HEADER)
                    .to_string(),
            }),
            _ => None,
        };

        Ok(ResolverSettings {
            platform,
            http: HttpSettings {
                connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
                request_timeout: Duration::from_secs(self.http.request_timeout_secs),
                retry: self.retry_policy(),
            },
            cookie: non_empty(self.credentials.cookie.as_deref()).map(str::to_string),
            cookie_file: self.credentials.cookie_file.clone(),
            relay,
        })
    }

    /// Settings for the transfer pipeline.
    #[must_use]
    pub fn transfer_settings(&self) -> TransferSettings {
        let defaults = TransferSettings::default();
        TransferSettings {
            staging_dir: self.staging_dir.clone().unwrap_or(defaults.staging_dir),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.http.download_read_timeout_secs),
            retry: self.retry_policy(),
            user_agent: non_empty(self.platform.user_agent.as_deref())
                .map_or(defaults.user_agent, str::to_string),
            preflight: self.preflight,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn validate_range(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

fn parse_http_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value.trim())
        .with_context(|| format!("Invalid config value for `{field}`: {value}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Invalid config value for `{field}`: {value}. Expected an http(s) URL");
    }
    Ok(url)
}
