//! In-memory resources addressed by handle

use super::{ByteRequest, Fetcher, ResourceMeta, slice_whole};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Scheme of handles produced by [`ResourceStore::register`]
pub const HANDLE_SCHEME: &str = "memory:";

/// Registry of in-memory resources (playlists, segments, keys)
///
/// Handles are plain strings, so a registered playlist can be downloaded with
/// `DownloadRequest::new(handle)` and may itself list other handles or
/// absolute URLs. Playlists parsed from a handle keep their URIs verbatim.
///
/// Cloning shares the registry.
#[derive(Clone, Default)]
pub struct ResourceStore {
    entries: Arc<RwLock<HashMap<String, Bytes>>>,
    next_handle: Arc<AtomicU64>,
}

impl ResourceStore {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `body` under a fresh `memory:<n>` handle
    pub fn register(&self, body: impl Into<Bytes>) -> String {
        let handle = format!(
            "{HANDLE_SCHEME}{}",
            self.next_handle.fetch_add(1, Ordering::Relaxed)
        );
        self.insert(handle.clone(), body);
        handle
    }

    /// Store `body` under `handle`, replacing any previous entry
    pub fn insert(&self, handle: impl Into<String>, body: impl Into<Bytes>) {
        let handle = handle.into();
        let body = body.into();
        debug!(handle = %handle, bytes = body.len(), "resource registered");
        self.write().insert(handle, body);
    }

    /// Forget `handle`, returning its body
    pub fn remove(&self, handle: &str) -> Option<Bytes> {
        self.write().remove(handle)
    }

    /// Body stored under `handle`
    pub fn get(&self, handle: &str) -> Option<Bytes> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
    }

    /// Whether `handle` is registered
    pub fn contains(&self, handle: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(handle)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Bytes>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serves [`ResourceStore`] handles from memory, everything else from `inner`
pub struct StoreFetcher<F> {
    inner: F,
    store: ResourceStore,
}

impl<F: Fetcher> StoreFetcher<F> {
    /// Check `store` before delegating to `inner`
    pub fn new(inner: F, store: ResourceStore) -> Self {
        Self { inner, store }
    }

    /// The registry consulted first
    pub fn store(&self) -> &ResourceStore {
        &self.store
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for StoreFetcher<F> {
    async fn get_text(&self, url: &str) -> Result<String> {
        match self.store.get(url) {
            Some(body) => String::from_utf8(body.to_vec())
                .map_err(|_| Error::MalformedPlaylist(format!("{url} is not UTF-8 text"))),
            None => self.inner.get_text(url).await,
        }
    }

    async fn get_bytes(&self, request: ByteRequest) -> Result<Bytes> {
        let Some(body) = self.store.get(&request.url) else {
            return self.inner.get_bytes(request).await;
        };
        if request.cancel.is_cancelled() {
            return Err(Error::Aborted);
        }
        let body = match request.range {
            Some(range) => slice_whole(body, range, &request.url)?,
            None => body,
        };
        if let Some(progress) = &request.progress {
            progress.set_total(body.len() as u64);
            progress.add_loaded(body.len() as u64);
        }
        Ok(body)
    }

    async fn head(&self, url: &str) -> Result<ResourceMeta> {
        match self.store.get(url) {
            Some(body) => Ok(ResourceMeta {
                content_length: Some(body.len() as u64),
                content_type: None,
            }),
            None => self.inner.head(url).await,
        }
    }
}
