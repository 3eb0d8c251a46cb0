//! A single cached query: last good value, staleness, and the in-flight fetch.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt, Shared};

use super::CacheKey;
use crate::error::{OrchestratorError, Result};

type InFlight<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Point-in-time view of a query, for status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub has_value: bool,
    pub is_stale: bool,
    pub is_fetching: bool,
    pub last_error: Option<String>,
    /// Number of loader runs started for this key.
    pub fetch_count: u64,
}

struct QueryInner<T> {
    value: Option<T>,
    fetched_at: Option<Instant>,
    invalidated: bool,
    /// Bumped by invalidation and direct writes; fetches started under an
    /// older generation do not store their result.
    generation: u64,
    in_flight: Option<InFlight<T>>,
    last_error: Option<OrchestratorError>,
    fetch_count: u64,
}

/// Cached result of one asynchronous query with request coalescing.
pub struct QueryCell<T> {
    key: CacheKey,
    stale_after: Option<Duration>,
    inner: Arc<Mutex<QueryInner<T>>>,
}

impl<T> Clone for QueryCell<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            stale_after: self.stale_after,
            inner: self.inner.clone(),
        }
    }
}

impl<T> QueryCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// `stale_after: None` keeps values until they are invalidated.
    pub fn new(key: CacheKey, stale_after: Option<Duration>) -> Self {
        Self {
            key,
            stale_after,
            inner: Arc::new(Mutex::new(QueryInner {
                value: None,
                fetched_at: None,
                invalidated: false,
                generation: 0,
                in_flight: None,
                last_error: None,
                fetch_count: 0,
            })),
        }
    }

    pub fn key(&self) -> CacheKey {
        self.key
    }

    fn lock(&self) -> MutexGuard<'_, QueryInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_stale(&self, g: &QueryInner<T>) -> bool {
        if g.value.is_none() || g.invalidated {
            return true;
        }
        match (self.stale_after, g.fetched_at) {
            (Some(max_age), Some(at)) => at.elapsed() >= max_age,
            _ => false,
        }
    }

    /// Cached value if present and not stale.
    pub fn fresh(&self) -> Option<T> {
        let g = self.lock();
        if self.is_stale(&g) {
            None
        } else {
            g.value.clone()
        }
    }

    /// Cached value regardless of staleness.
    pub fn peek(&self) -> Option<T> {
        self.lock().value.clone()
    }

    /// Serve the cached value if fresh, otherwise fetch.
    pub async fn get<F, Fut>(&self, loader: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(value) = self.fresh() {
            return Ok(value);
        }
        self.fetch(loader).await
    }

    /// Run `loader`, or join the fetch already in flight for this key.
    ///
    /// On success the value replaces the cached one. On failure the previous
    /// value is kept and the error goes to every caller awaiting this fetch.
    pub async fn fetch<F, Fut>(&self, loader: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let pending = {
            let mut g = self.lock();
            match &g.in_flight {
                Some(pending) => {
                    log::debug!("Cache: joining in-flight fetch for {}", self.key);
                    pending.clone()
                }
                None => {
                    g.fetch_count += 1;
                    let generation = g.generation;
                    let key = self.key;
                    let inner = self.inner.clone();
                    let load = loader();
                    let pending = async move {
                        let result = load.await;
                        let mut g = inner.lock().unwrap_or_else(PoisonError::into_inner);
                        if g.generation != generation {
                            log::debug!("Cache: discarding superseded fetch for {}", key);
                            return result;
                        }
                        g.in_flight = None;
                        match &result {
                            Ok(value) => {
                                g.value = Some(value.clone());
                                g.fetched_at = Some(Instant::now());
                                g.invalidated = false;
                                g.last_error = None;
                            }
                            Err(e) => {
                                log::warn!("Cache: fetch for {} failed: {}", key, e);
                                g.last_error = Some(e.clone());
                            }
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    g.in_flight = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Replace the cached value directly (optimistic local update).
    pub fn set(&self, value: T) {
        let mut g = self.lock();
        g.generation += 1;
        g.in_flight = None;
        g.value = Some(value);
        g.fetched_at = Some(Instant::now());
        g.invalidated = false;
        g.last_error = None;
    }

    /// Mark stale so the next `get` fetches. An in-flight fetch is detached:
    /// its callers still get its result, but it is not stored.
    pub fn invalidate(&self) {
        let mut g = self.lock();
        g.generation += 1;
        g.in_flight = None;
        g.invalidated = true;
    }

    pub fn state(&self) -> QueryState {
        let g = self.lock();
        QueryState {
            has_value: g.value.is_some(),
            is_stale: self.is_stale(&g),
            is_fetching: g.in_flight.is_some(),
            last_error: g.last_error.as_ref().map(|e| e.to_string()),
            fetch_count: g.fetch_count,
        }
    }
}
