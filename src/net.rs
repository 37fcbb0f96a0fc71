//! Shared reqwest client construction with a proxy-lookup panic fallback.

use std::panic::{AssertUnwindSafe, catch_unwind};

use reqwest::{Client, ClientBuilder, Proxy};
use tracing::warn;

/// Builds a client from `make_builder`, retrying without system proxy lookup
/// if the first build panics.
///
/// Some sandboxed environments panic when querying system proxy settings;
/// the fallback still honours `HTTP(S)_PROXY`/`ALL_PROXY`.
///
/// # Errors
///
/// Returns a human-readable reason when both builds fail.
pub(crate) fn build_client_with_fallback<F>(label: &str, make_builder: F) -> Result<Client, String>
where
    F: Fn() -> ClientBuilder,
{
    match try_build(&make_builder, false) {
        Ok(client) => Ok(client),
        Err(BuildFailure::Panic) => {
            warn!(
                client = label,
                "HTTP client hit system proxy panic; using env-proxy fallback builder"
            );
            try_build(&make_builder, true).map_err(BuildFailure::into_reason)
        }
        Err(failure) => Err(failure.into_reason()),
    }
}

enum BuildFailure {
    Panic,
    Build(reqwest::Error),
}

impl BuildFailure {
    fn into_reason(self) -> String {
        match self {
            Self::Panic => {
                "HTTP client construction panicked while initializing networking".to_string()
            }
            Self::Build(error) => format!("HTTP client construction failed: {error}"),
        }
    }
}

fn try_build<F>(make_builder: &F, disable_system_proxy_lookup: bool) -> Result<Client, BuildFailure>
where
    F: Fn() -> ClientBuilder,
{
    catch_unwind(AssertUnwindSafe(|| {
        let mut builder = make_builder();
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildFailure::Build)
    }))
    .map_err(|_| BuildFailure::Panic)?
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    let names: &[&str] = match scheme {
        "https" => &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
        "http" => &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"],
        _ => return None,
    };
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
