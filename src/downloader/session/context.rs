//! Session context: everything one download task reads while it runs

use crate::crypto::KeyStore;
use crate::fetch::{Fetcher, OnceMap};
use crate::playlist::{InitSegment, MediaPlaylist, Resolution};
use crate::retry::RetryBudget;
use crate::types::{Container, DownloadId, Event, SessionState};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

/// Shared, read-only state for a session plus its per-session caches
///
/// Owned by the session task; in-flight dispatches borrow it.
pub(crate) struct SessionContext {
    pub(crate) id: DownloadId,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) media: MediaPlaylist,
    pub(crate) container: Container,
    pub(crate) resolution: Option<Resolution>,
    pub(crate) path: PathBuf,
    /// Maximum outstanding segment requests
    pub(crate) concurrency: usize,
    pub(crate) budget: RetryBudget,
    pub(crate) segment_timeout: Duration,
    pub(crate) progress_interval: Duration,
    /// Decryption keys, one fetch per key URI
    pub(crate) keys: KeyStore,
    /// Init segments, one fetch per (URI, range)
    pub(crate) inits: OnceMap<InitSegment, Bytes>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Lifecycle state, shared with the controller
    pub(crate) state: Arc<watch::Sender<SessionState>>,
    /// Session-wide cancellation; every dispatch token is a child of this one
    pub(crate) cancel: CancellationToken,
}

impl SessionContext {
    /// Broadcast `event`, ignoring the no-subscriber case
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Enter a terminal state
    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    pub(crate) fn total_segments(&self) -> usize {
        self.media.segments.len()
    }
}
