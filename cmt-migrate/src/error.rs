//! Error types for cmt-migrate
//!
//! Classification drives the retry loop in the rate-limited client:
//! - Transient (network, timeout, 5xx, throttling): retried
//! - Permanent (4xx other than 429): returned immediately
//!
//! Everything here is item-level. Fatal errors (configuration, unreadable
//! state) use [`cmt_common::Error`] and abort before any work starts.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single transport round-trip (no HTTP status available)
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),
}

/// Failure of one logical platform operation, after retry policy
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    /// Network failure or 5xx; may succeed if repeated
    #[error("transient failure: {0}")]
    Transient(String),

    /// Validation-class rejection; repeating would not help
    #[error("rejected by platform (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("still throttled after {0} waits")]
    ThrottleLimit(u32),

    /// The handle is taken by a target record with a different SKU
    #[error("handle {handle} already belongs to target record {target_id} with a different SKU")]
    ReferenceConflict { handle: String, target_id: String },

    /// 2xx response whose body lacks what the operation needs
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl PlatformError {
    /// Whether the rate-limited client should try again
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlatformError::Transient(_))
    }
}

impl From<TransportError> for PlatformError {
    fn from(err: TransportError) -> Self {
        PlatformError::Transient(err.to_string())
    }
}
