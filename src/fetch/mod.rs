//! Fetch layer
//!
//! Everything the downloader reads from the network goes through the [`Fetcher`]
//! trait. [`HttpFetcher`] is the reqwest implementation; [`CachingFetcher`]
//! decorates any fetcher with bounded text/metadata caches and collapses
//! concurrent duplicate requests. [`StoreFetcher`] serves handles registered
//! in a [`ResourceStore`] from memory and passes everything else through.
//! Binary payloads (segments, keys, init segments) are never cached here; the
//! session keeps its own per-session key/init caches.

mod cache;
mod http;
mod once;
mod store;

pub use cache::CachingFetcher;
pub use http::HttpFetcher;
pub use once::OnceMap;
pub use store::{ResourceStore, StoreFetcher};

use crate::error::{Error, Result};
use crate::playlist::ByteRange;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Source of playlists, segments, keys and metadata
///
/// Implement this to download from somewhere other than HTTP, or to script
/// responses in tests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a playlist as text
    async fn get_text(&self, url: &str) -> Result<String>;

    /// Fetch a binary payload, honoring the request's range, timeout and cancellation
    async fn get_bytes(&self, request: ByteRequest) -> Result<Bytes>;

    /// Fetch response metadata without the body
    async fn head(&self, url: &str) -> Result<ResourceMeta>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn get_text(&self, url: &str) -> Result<String> {
        (**self).get_text(url).await
    }

    async fn get_bytes(&self, request: ByteRequest) -> Result<Bytes> {
        (**self).get_bytes(request).await
    }

    async fn head(&self, url: &str) -> Result<ResourceMeta> {
        (**self).head(url).await
    }
}

/// A binary fetch
#[derive(Clone, Debug)]
pub struct ByteRequest {
    /// Resource URL
    pub url: String,
    /// Sub-range to request
    pub range: Option<ByteRange>,
    /// Deadline for the whole transfer
    pub timeout: Duration,
    /// Receives byte counts as the body arrives
    pub progress: Option<Arc<TransferProgress>>,
    /// Aborts the transfer with [`Error::Aborted`](crate::Error::Aborted)
    pub cancel: CancellationToken,
}

impl ByteRequest {
    /// Request the whole resource at `url`
    pub fn new(url: impl Into<String>, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            url: url.into(),
            range: None,
            timeout,
            progress: None,
            cancel,
        }
    }

    /// Restrict the request to `range`
    pub fn with_range(mut self, range: Option<ByteRange>) -> Self {
        self.range = range;
        self
    }

    /// Report transfer progress into `progress`
    pub fn with_progress(mut self, progress: Arc<TransferProgress>) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Byte counters for one transfer, shared between the fetcher and the scheduler
#[derive(Debug, Default)]
pub struct TransferProgress {
    loaded: AtomicU64,
    // 0 means unknown
    total: AtomicU64,
}

impl TransferProgress {
    /// Fresh counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the expected body length
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    /// Record `bytes` more received
    pub fn add_loaded(&self, bytes: u64) {
        self.loaded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Bytes received so far
    pub fn loaded(&self) -> u64 {
        self.loaded.load(Ordering::Relaxed)
    }

    /// Expected body length, when known
    pub fn total(&self) -> Option<u64> {
        match self.total.load(Ordering::Relaxed) {
            0 => None,
            total => Some(total),
        }
    }
}

/// Cut `range` out of the complete body of the resource at `url`
///
/// A body that ends before the range does fails with
/// [`Error::RangeMismatch`] rather than handing back the wrong bytes.
pub(crate) fn slice_whole(body: Bytes, range: ByteRange, url: &str) -> Result<Bytes> {
    let len = body.len() as u64;
    if len <= range.end_inclusive {
        return Err(Error::RangeMismatch {
            url: url.to_string(),
            expected: range.len(),
            received: len.saturating_sub(range.start),
        });
    }
    Ok(body.slice(range.start as usize..=range.end_inclusive as usize))
}

/// Response metadata from a HEAD request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// `Content-Length`
    pub content_length: Option<u64>,
    /// `Content-Type`
    pub content_type: Option<String>,
}
