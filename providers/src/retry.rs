//! HTTP retry policy with exponential backoff.
//!
//! # Retry Policy
//!
//! - Max retries: 1 (2 total attempts), configurable
//! - Initial delay: 250ms
//! - Max delay: 2 seconds
//! - Jitter: down-jitter up to 25% (multiplier in [0.75, 1.0])
//!
//! # Retryable Conditions
//!
//! - HTTP 408, 409, 429, 5xx
//! - Connection errors and request timeouts
//!
//! Only idempotent gateway calls (describe, stop) go through
//! [`send_with_retry`]. Launches use [`send_once`].
//!
//! Every attempt carries an `Idempotency-Key` header; the key is the same
//! across all attempts of one logical call.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};
use uuid::Uuid;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (not counting initial request).
    pub max_retries: u32,
    /// Initial backoff delay before first retry.
    pub initial_delay: Duration,
    /// Maximum backoff delay.
    pub max_delay: Duration,
    /// Jitter factor for down-jitter (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            jitter_factor: 0.25,
        }
    }
}

/// Parse a `Retry-After` header given in whole seconds.
///
/// Returns `Some(duration)` only for `0 < duration < 60s`.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    let duration = Duration::from_secs(secs);
    (duration > Duration::ZERO && duration < Duration::from_secs(60)).then_some(duration)
}

#[must_use]
pub fn should_retry(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 409 | 429 | 500..=599)
}

/// Calculate retry delay with exponential backoff and jitter.
///
/// `backoff_step` is 0 before the first retry, 1 before the second, etc.
/// A valid `Retry-After` header wins over the computed delay.
#[must_use]
pub fn calculate_retry_delay(
    backoff_step: u32,
    config: &RetryConfig,
    headers: Option<&HeaderMap>,
) -> Duration {
    if let Some(headers) = headers
        && let Some(delay) = parse_retry_after(headers)
    {
        return delay.min(config.max_delay);
    }

    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter = 1.0 - rand::random::<f64>() * config.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

#[must_use]
pub fn generate_idempotency_key() -> String {
    format!("sandlot-{}", Uuid::new_v4())
}

/// Outcome of a (possibly retried) request.
///
/// Success and failure are distinct variants so an error response can never
/// be mistaken for a good one.
#[derive(Debug)]
pub enum RetryOutcome {
    /// 2xx response.
    Success(Response),
    /// Non-2xx response, after exhausting retries if the status was retryable.
    HttpError(Response),
    /// Transport failure after exhausting retries.
    ConnectionError {
        attempts: u32,
        source: reqwest::Error,
    },
    /// Transport failure that was not worth retrying.
    NonRetryable(reqwest::Error),
}

impl RetryOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Send a request with automatic retries.
///
/// `build_request` is called once per attempt.
pub async fn send_with_retry<F>(build_request: F, config: &RetryConfig) -> RetryOutcome
where
    F: Fn() -> RequestBuilder,
{
    let idempotency_key = generate_idempotency_key();

    let mut attempt = 0;
    loop {
        let is_last = attempt >= config.max_retries;
        let request = build_request().header(IDEMPOTENCY_KEY_HEADER, &idempotency_key);

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return RetryOutcome::Success(response);
                }
                if is_last || !should_retry(status) {
                    return RetryOutcome::HttpError(response);
                }

                let delay = calculate_retry_delay(attempt, config, Some(response.headers()));
                tracing::debug!(
                    status = %status,
                    retry_count = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying request after error status"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    return if attempt == 0 {
                        RetryOutcome::NonRetryable(e)
                    } else {
                        RetryOutcome::ConnectionError {
                            attempts: attempt + 1,
                            source: e,
                        }
                    };
                }
                if is_last {
                    return RetryOutcome::ConnectionError {
                        attempts: attempt + 1,
                        source: e,
                    };
                }

                let delay = calculate_retry_delay(attempt, config, None);
                tracing::debug!(
                    error = %e,
                    retry_count = attempt + 1,
                    delay_ms = delay.as_millis(),
                    "Retrying request after connection error"
                );
                tokio::time::sleep(delay).await;
            }
        }

        attempt += 1;
    }
}

/// Send a request exactly once, for calls that must not be repeated.
pub async fn send_once(request: RequestBuilder) -> RetryOutcome {
    let request = request.header(IDEMPOTENCY_KEY_HEADER, generate_idempotency_key());
    match request.send().await {
        Ok(response) if response.status().is_success() => RetryOutcome::Success(response),
        Ok(response) => RetryOutcome::HttpError(response),
        Err(e) => RetryOutcome::NonRetryable(e),
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}
