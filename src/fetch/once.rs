//! Keyed at-most-once initialization

use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

/// Map of lazily initialized values, one initialization per key
///
/// Concurrent callers for the same key share one in-flight initialization. A
/// failed initialization leaves the key empty, so the next caller tries again.
#[derive(Debug)]
pub struct OnceMap<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for OnceMap<K, V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> OnceMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for `key`, running `init` only if no value exists yet
    ///
    /// Successful values stay in the map until [`clear`](Self::clear).
    pub async fn get_or_try_init<F, Fut>(&self, key: K, init: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let cell = self.cell(key).await;
        cell.get_or_try_init(init).await.cloned()
    }

    /// Run `init` once for all concurrent callers of `key`, then forget the key
    ///
    /// Callers arriving after completion start a new initialization; pair this
    /// with an external cache that `init` fills before returning.
    pub async fn collapse<F, Fut>(&self, key: K, init: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let cell = self.cell(key.clone()).await;
        let result = cell.get_or_try_init(init).await.cloned();

        let mut cells = self.cells.lock().await;
        if cells.get(&key).is_some_and(|current| Arc::ptr_eq(current, &cell)) {
            cells.remove(&key);
        }
        result
    }

    /// Whether `key` holds a value
    pub async fn contains(&self, key: &K) -> bool {
        self.cells
            .lock()
            .await
            .get(key)
            .is_some_and(|cell| cell.initialized())
    }

    /// Forget every key
    pub async fn clear(&self) {
        self.cells.lock().await.clear();
    }

    async fn cell(&self, key: K) -> Arc<OnceCell<V>> {
        self.cells.lock().await.entry(key).or_default().clone()
    }
}
