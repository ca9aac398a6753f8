//! Error types for hls-dl
//!
//! This module provides the error taxonomy for the library:
//! - Playlist errors (malformed text, empty media playlists, missing variants)
//! - Segment errors (unsupported encryption, bad keys, decryption failures)
//! - Transport errors (HTTP status, timeouts, aborted requests)
//! - Session errors (invalid control operations, cancellation, blocked output)
//!
//! Every error maps to an [`ErrorCategory`], which is what gets reported through
//! [`Event::Failed`](crate::types::Event::Failed).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for hls-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hls-dl
#[derive(Debug, Error)]
pub enum Error {
    /// The playlist text has no recognizable HLS tags or contains an unparsable value
    #[error("malformed playlist: {0}")]
    MalformedPlaylist(String),

    /// A media playlist without a single segment
    #[error("media playlist contains no segments")]
    EmptyMedia,

    /// A master playlist without a single usable variant stream
    #[error("master playlist contains no variants")]
    NoVariants,

    /// The media playlist has no `#EXT-X-ENDLIST` and cannot be reconstructed
    #[error("playlist is not terminated (live streams are not supported)")]
    LivePlaylist,

    /// The segment declares an encryption method other than AES-128
    #[error("unsupported encryption method: {method}")]
    UnsupportedEncryption {
        /// The `METHOD` attribute value from `#EXT-X-KEY`
        method: String,
    },

    /// Key bytes fetched from the key URI are not a valid AES-128 key
    #[error("invalid AES-128 key from {uri}: expected 16 bytes, got {len}")]
    InvalidKey {
        /// The key URI
        uri: String,
        /// The number of bytes actually received
        len: usize,
    },

    /// AES-128-CBC decryption failed (bad padding or misaligned ciphertext)
    #[error("decryption failed: {0}")]
    Decrypt(String),

    /// The server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Http {
        /// HTTP status code
        status: u16,
        /// The requested URL
        url: String,
    },

    /// The response body does not cover the requested byte range
    #[error("byte range mismatch for {url}: expected {expected} bytes, received {received}")]
    RangeMismatch {
        /// The requested URL
        url: String,
        /// Length of the requested range
        expected: u64,
        /// Bytes the response could supply for it
        received: u64,
    },

    /// The request did not complete within its timeout
    #[error("request timed out: {url}")]
    Timeout {
        /// The requested URL
        url: String,
    },

    /// The request was interrupted by pause or cancellation
    #[error("request aborted")]
    Aborted,

    /// Transport-level failure from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error (output file creation, writes, renames)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// Cannot perform a control operation in the session's current state
    #[error("cannot {operation} session in state {current_state}")]
    InvalidState {
        /// The operation that was attempted (e.g., "pause", "resume")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },

    /// A segment failed permanently and blocks sequential output
    #[error("segment {index} failed after {attempts} attempt(s): {source}")]
    SegmentFailed {
        /// Index of the segment in playlist order
        index: usize,
        /// Number of attempts made
        attempts: u32,
        /// The last error observed for this segment
        #[source]
        source: Box<Error>,
    },

    /// The session was cancelled by the caller
    #[error("download cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Coarse error classification reported to progress/status consumers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Playlist could not be parsed or is not downloadable
    Playlist,
    /// Encryption is unsupported or decryption failed
    Encryption,
    /// Network-level failure (HTTP status, timeout, transport)
    Network,
    /// Local output failure
    Output,
    /// Invalid configuration
    Config,
    /// Control operation rejected
    State,
    /// Cancelled by the caller
    Cancelled,
    /// Anything else
    Other,
}

impl Error {
    /// Classify this error for status reporting.
    ///
    /// `SegmentFailed` reports the category of its underlying cause.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MalformedPlaylist(_)
            | Error::EmptyMedia
            | Error::NoVariants
            | Error::LivePlaylist
            | Error::InvalidUrl(_) => ErrorCategory::Playlist,
            Error::UnsupportedEncryption { .. } | Error::InvalidKey { .. } | Error::Decrypt(_) => {
                ErrorCategory::Encryption
            }
            Error::Http { .. }
            | Error::RangeMismatch { .. }
            | Error::Timeout { .. }
            | Error::Aborted
            | Error::Network(_) => ErrorCategory::Network,
            Error::Io(_) => ErrorCategory::Output,
            Error::Config { .. } => ErrorCategory::Config,
            Error::InvalidState { .. } => ErrorCategory::State,
            Error::SegmentFailed { source, .. } => source.category(),
            Error::Cancelled => ErrorCategory::Cancelled,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Shorthand for a configuration error tied to a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Playlist => "playlist",
            ErrorCategory::Encryption => "encryption",
            ErrorCategory::Network => "network",
            ErrorCategory::Output => "output",
            ErrorCategory::Config => "config",
            ErrorCategory::State => "state",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::Other => "other",
        };
        f.write_str(name)
    }
}
