//! Shared User-Agent strings for platform, relay and transfer HTTP clients.

/// Desktop browser User-Agent presented to the share platform.
///
/// The platform serves token-bearing pages only to browser-like clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Project URL for User-Agent identification on non-platform traffic.
const PROJECT_UA_URL: &str = "https://github.com/fierce/teradl";

/// User-Agent for relay API calls (identifies the tool).
#[must_use]
pub(crate) fn default_tool_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("teradl/{version} (+{PROJECT_UA_URL})")
}
