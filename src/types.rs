//! Core types for hls-dl

use crate::error::ErrorCategory;
use crate::playlist::{Resolution, Variant};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a download session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(pub u64);

impl DownloadId {
    /// Create a new DownloadId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for DownloadId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for DownloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Download session state
///
/// `Running` and `Paused` are live; the other three are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Dispatching and writing segments
    Running,
    /// Dispatch stopped by the caller, in-flight requests aborted
    Paused,
    /// Every segment written and the sink closed
    Completed,
    /// A permanent failure reached the write cursor
    Failed,
    /// Cancelled by the caller
    Cancelled,
}

impl SessionState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Output container, derived from the media playlist
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// MPEG transport stream segments
    Ts,
    /// Fragmented MP4 (init segment + `.m4s` fragments)
    Mp4,
}

impl Container {
    /// File extension without the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Ts => "ts",
            Container::Mp4 => "mp4",
        }
    }
}

/// Kind of the root playlist a download started from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistKind {
    /// Multi-variant playlist
    Master,
    /// Single media playlist
    Media,
}

/// Event emitted during a download session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Root playlist fetched and parsed
    PlaylistResolved {
        /// Download ID
        id: DownloadId,
        /// Root playlist URL
        url: String,
        /// Master or media playlist
        kind: PlaylistKind,
        /// Number of variants (0 for a media playlist)
        variants: usize,
    },

    /// Variant chosen from a master playlist
    VariantSelected {
        /// Download ID
        id: DownloadId,
        /// The chosen variant
        variant: Variant,
    },

    /// Segment scheduling started
    Started {
        /// Download ID
        id: DownloadId,
        /// Number of media segments
        segments: usize,
        /// Output container
        container: Container,
        /// Final output path
        path: PathBuf,
    },

    /// Progress update
    Progress {
        /// Download ID
        id: DownloadId,
        /// Completion percentage (0.0 to 100.0)
        percent: f32,
        /// Session state at the time of the update
        status: SessionState,
        /// Segments fetched so far
        done: usize,
        /// Total segments
        total: usize,
    },

    /// Session paused
    Paused {
        /// Download ID
        id: DownloadId,
    },

    /// Session resumed
    Resumed {
        /// Download ID
        id: DownloadId,
    },

    /// Output file written
    Completed {
        /// Download ID
        id: DownloadId,
        /// Final output path
        path: PathBuf,
        /// Bytes written
        bytes: u64,
    },

    /// Session failed
    Failed {
        /// Download ID
        id: DownloadId,
        /// Error classification
        category: ErrorCategory,
        /// Error message
        error: String,
    },

    /// Session cancelled by the caller
    Cancelled {
        /// Download ID
        id: DownloadId,
    },
}

/// Result of a completed download
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// Download ID
    pub id: DownloadId,
    /// Final output path
    pub path: PathBuf,
    /// Bytes written
    pub bytes: u64,
    /// Segments written
    pub segments: usize,
    /// Output container
    pub container: Container,
    /// Resolution of the downloaded variant, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}
