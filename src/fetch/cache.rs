//! Deduplicating LRU decorator for any [`Fetcher`]

use super::{ByteRequest, Fetcher, OnceMap, ResourceMeta};
use crate::config::CacheConfig;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

/// Caches playlist text and HEAD metadata in front of another fetcher
///
/// - Two independent LRU caches keyed by URL, evicting the least recently used
///   entry on overflow
/// - Concurrent requests for the same uncached URL share one upstream request
/// - Binary requests pass straight through
pub struct CachingFetcher<F> {
    inner: F,
    text: Mutex<LruCache<String, String>>,
    meta: Mutex<LruCache<String, ResourceMeta>>,
    text_inflight: OnceMap<String, String>,
    meta_inflight: OnceMap<String, ResourceMeta>,
}

impl<F: Fetcher> CachingFetcher<F> {
    /// Wrap `inner` with caches sized by `config`
    pub fn new(inner: F, config: &CacheConfig) -> Result<Self> {
        Ok(Self::with_capacity(
            inner,
            config.text_capacity()?,
            config.metadata_capacity()?,
        ))
    }

    /// Wrap `inner` with explicit capacities
    pub fn with_capacity(inner: F, text: NonZeroUsize, meta: NonZeroUsize) -> Self {
        Self {
            inner,
            text: Mutex::new(LruCache::new(text)),
            meta: Mutex::new(LruCache::new(meta)),
            text_inflight: OnceMap::new(),
            meta_inflight: OnceMap::new(),
        }
    }

    /// The wrapped fetcher
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Drop every cached entry
    pub async fn clear(&self) {
        self.text.lock().await.clear();
        self.meta.lock().await.clear();
        self.text_inflight.clear().await;
        self.meta_inflight.clear().await;
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for CachingFetcher<F> {
    async fn get_text(&self, url: &str) -> Result<String> {
        if let Some(text) = self.text.lock().await.get(url) {
            return Ok(text.clone());
        }
        self.text_inflight
            .collapse(url.to_string(), || async {
                let text = self.inner.get_text(url).await?;
                self.text.lock().await.put(url.to_string(), text.clone());
                Ok(text)
            })
            .await
    }

    async fn get_bytes(&self, request: ByteRequest) -> Result<Bytes> {
        self.inner.get_bytes(request).await
    }

    async fn head(&self, url: &str) -> Result<ResourceMeta> {
        if let Some(meta) = self.meta.lock().await.get(url) {
            return Ok(meta.clone());
        }
        self.meta_inflight
            .collapse(url.to_string(), || async {
                let meta = self.inner.head(url).await?;
                self.meta.lock().await.put(url.to_string(), meta.clone());
                Ok(meta)
            })
            .await
    }
}
