//! Retry classification for segment failures
//!
//! The segment scheduler does not sleep between attempts; a failed segment is
//! requeued and picked up ahead of never-attempted segments. This module decides
//! which failures are worth another attempt and tracks the per-segment budget.
//!
//! # Example
//!
//! ```
//! use hls_dl::retry::{IsRetryable, RetryBudget};
//! use hls_dl::Error;
//!
//! let err = Error::Http { status: 503, url: "https://cdn.example.com/0.ts".into() };
//! assert!(err.is_retryable());
//!
//! let budget = RetryBudget::new(3);
//! assert!(budget.allows_another(3));
//! assert!(!budget.allows_another(4));
//! ```

use crate::error::Error;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (HTTP errors, timeouts, connection resets) should return `true`.
/// Permanent failures (unsupported encryption, bad keys, corrupt data) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Any HTTP status is retried; CDNs return spurious 403/404 under load
            Error::Http { .. } => true,
            // Truncated or misdirected bodies are usually transient on CDNs
            Error::RangeMismatch { .. } => true,
            Error::Timeout { .. } => true,
            // An abort is only a content failure when nobody paused or cancelled;
            // the scheduler decides that before consulting this trait
            Error::Aborted => true,
            Error::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Error::UnsupportedEncryption { .. } => false,
            Error::InvalidKey { .. } => false,
            Error::Decrypt(_) => false,
            Error::MalformedPlaylist(_)
            | Error::EmptyMedia
            | Error::NoVariants
            | Error::LivePlaylist
            | Error::InvalidUrl(_) => false,
            Error::Config { .. } => false,
            Error::InvalidState { .. } => false,
            Error::SegmentFailed { .. } => false,
            Error::Cancelled => false,
            Error::Other(_) => false,
        }
    }
}

/// Per-segment retry allowance
///
/// `max_retries` counts retries, not attempts: a budget of 3 permits 4 attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryBudget {
    max_retries: u32,
}

impl RetryBudget {
    /// Create a budget permitting `max_retries` retries after the first attempt
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Maximum number of retries
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether a segment that has failed `failures` times may be attempted again
    pub fn allows_another(&self, failures: u32) -> bool {
        failures <= self.max_retries
    }
}
