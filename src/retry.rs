//! Bounded retry with exponential backoff for individual HTTP calls.
//!
//! Scraped endpoints fail transiently all the time, so every request a
//! resolver or the transfer pipeline makes goes through a [`RetryPolicy`].
//! Retries repeat one HTTP call; they never restart a whole resolution.
//!
//! Failures are classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - timeouts, connection errors, 408 and 5xx
//! - [`FailureType::RateLimited`] - HTTP 429
//! - [`FailureType::NeedsAuth`] - 401/403/407, usually an expired session cookie
//! - [`FailureType::Permanent`] - everything else
//!
//! # Example
//!
//! ```
//! use teradl_core::retry::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! match policy.should_retry(FailureType::Transient, 1) {
//!     RetryDecision::Retry { delay, attempt } => println!("retry #{attempt} in {delay:?}"),
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use reqwest::{RequestBuilder, Response};
use tracing::{debug, instrument, warn};

/// Default maximum attempts per HTTP call (including the first).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (16 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(16);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of an HTTP failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,
    /// Failure that won't succeed regardless of retries.
    Permanent,
    /// The platform rejected the session (expired or missing cookie).
    NeedsAuth,
    /// Server rate limiting (HTTP 429).
    RateLimited,
}

/// Decision on whether to retry a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },
    /// Give up.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter
/// ```
///
/// Jitter is at most half the base delay, capped at 500ms.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings; `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::with_max_attempts(1)
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether the attempt that just failed (1-indexed) should be retried.
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::NeedsAuth => {
                return RetryDecision::DoNotRetry {
                    reason: "session rejected by platform - refresh the auth cookie".to_string(),
                };
            }
            FailureType::Transient | FailureType::RateLimited => {}
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.calculate_delay(attempt),
            attempt: attempt + 1,
        }
    }

    /// Sends the request built by `build`, retrying transient failures.
    ///
    /// Returns the last response even when its status is an error, so callers
    /// keep control over how a non-success status maps onto their own error
    /// type. Transport errors are returned once retries are exhausted.
    ///
    /// # Errors
    ///
    /// Returns the final [`reqwest::Error`] when no attempt produced a response.
    pub async fn send<F>(&self, label: &str, mut build: F) -> Result<Response, reqwest::Error>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let outcome = build().send().await;
            let failure = match &outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    is_retryable_status(status).then(|| classify_http_status(status))
                }
                Err(error) => Some(classify_transport_error(error)),
            };
            let Some(failure) = failure else {
                return outcome;
            };

            match self.should_retry(failure, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        request = label,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        failure = ?failure,
                        "HTTP call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(request = label, attempt, reason = %reason, "not retrying");
                    return outcome;
                }
            }
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * f64::from(self.backoff_multiplier).powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let ceiling = MAX_JITTER.min(self.base_delay / 2).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// Returns true for statuses worth another attempt.
fn is_retryable_status(status: u16) -> bool {
    matches!(
        classify_http_status(status),
        FailureType::Transient | FailureType::RateLimited
    )
}

/// Classifies an HTTP status code.
///
/// 2xx and 3xx are reported as `Permanent` because there is nothing to retry.
#[must_use]
#[allow(clippy::match_same_arms)]
pub fn classify_http_status(status: u16) -> FailureType {
    match status {
        401 | 403 | 407 => FailureType::NeedsAuth,
        408 => FailureType::Transient,
        429 => FailureType::RateLimited,
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

/// Classifies a transport-level reqwest error.
#[must_use]
pub fn classify_transport_error(error: &reqwest::Error) -> FailureType {
    if error.is_builder() || error.is_redirect() || error.is_decode() || is_tls_error(error) {
        FailureType::Permanent
    } else {
        FailureType::Transient
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let message = error.to_string().to_lowercase();
    message.contains("certificate") || message.contains("tls") || message.contains("handshake")
}
