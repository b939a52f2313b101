//! Rate-limited, retrying platform client
//!
//! Each worker owns one [`RateLimitedClient`], and with it one
//! [`RateLimiter`]. Pacing is therefore per worker; the transport (HTTP
//! connection pool) is shared.
//!
//! Retry policy for one logical call:
//! - 429: sleep `Retry-After` (or the default), retry; not counted as an attempt
//! - network error, timeout, 5xx: retry with `2^attempt` s backoff, up to `max_attempts`
//! - other 4xx: return immediately

use crate::error::PlatformError;
use crate::services::platform_transport::{PlatformRequest, PlatformResponse, PlatformTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Minimum spacing between consecutive requests of one caller
#[derive(Debug)]
pub struct RateLimiter {
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: None,
            min_interval,
        }
    }

    /// Wait if necessary to comply with rate limit, then stamp the request start
    pub async fn wait(&mut self) {
        if let Some(last_time) = self.last_request {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!(wait_ms = wait_time.as_millis() as u64, "Rate limiting: waiting");
                tokio::time::sleep(wait_time).await;
            }
        }

        self.last_request = Some(Instant::now());
    }
}

/// Bounded retry settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts for transient failures, including the first
    pub max_attempts: u32,
    /// Backoff after failed attempt `n` is `backoff_unit * 2^n`
    pub backoff_unit: Duration,
    /// Used when a 429 carries no `Retry-After`
    pub default_throttle_wait: Duration,
    /// Upper bound on throttle waits within one call
    pub max_throttle_waits: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
            default_throttle_wait: Duration::from_secs(2),
            max_throttle_waits: 20,
        }
    }
}

impl RetryPolicy {
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_unit * 2u32.saturating_pow(attempt)
    }
}

/// Platform client owned by one worker
pub struct RateLimitedClient {
    transport: Arc<dyn PlatformTransport>,
    limiter: RateLimiter,
    policy: RetryPolicy,
    worker: usize,
}

impl RateLimitedClient {
    pub fn new(
        transport: Arc<dyn PlatformTransport>,
        min_interval: Duration,
        policy: RetryPolicy,
        worker: usize,
    ) -> Self {
        Self {
            transport,
            limiter: RateLimiter::new(min_interval),
            policy,
            worker,
        }
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Perform one logical request under the pacing and retry policy
    ///
    /// Returns the first 2xx response, or the classified error.
    pub async fn call(&mut self, request: &PlatformRequest) -> Result<PlatformResponse, PlatformError> {
        let mut attempt: u32 = 1;
        let mut throttle_waits: u32 = 0;

        loop {
            self.limiter.wait().await;

            let failure = match self.transport.send(request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) if response.is_throttle() => {
                    throttle_waits += 1;
                    if throttle_waits > self.policy.max_throttle_waits {
                        return Err(PlatformError::ThrottleLimit(self.policy.max_throttle_waits));
                    }
                    let wait = response
                        .retry_after
                        .unwrap_or(self.policy.default_throttle_wait);
                    warn!(
                        worker = self.worker,
                        path = %request.path,
                        wait_ms = wait.as_millis() as u64,
                        "Throttled by platform, waiting"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                Ok(response) if response.is_server_error() => PlatformError::Transient(format!(
                    "server error {}: {}",
                    response.status,
                    response.error_text()
                )),
                Ok(response) => PlatformError::Rejected {
                    status: response.status,
                    message: response.error_text(),
                },
                Err(err) => PlatformError::from(err),
            };

            if !failure.is_retryable() {
                return Err(failure);
            }
            if attempt >= self.policy.max_attempts {
                return Err(PlatformError::RetriesExhausted {
                    attempts: attempt,
                    last: failure.to_string(),
                });
            }

            let backoff = self.policy.backoff_for(attempt);
            warn!(
                worker = self.worker,
                path = %request.path,
                attempt,
                max_attempts = self.policy.max_attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %failure,
                "Retrying after transient failure"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}
