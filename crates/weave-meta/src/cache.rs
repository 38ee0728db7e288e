//! Single-flight, invalidatable memoization.
//!
//! A [`Cache`] computes values through a [`CacheProvider`]. Concurrent
//! requests for the same id share one computation, finished values are
//! returned without recomputation, and [`Cache::invalidate`] drops both a
//! finished value and any computation still in flight. Errors are never
//! cached.
//!
//! Every value carries the set of files it was derived from, so a caller
//! that receives a cached value can still learn what it depends on. A file
//! change reported while a computation runs keeps its result out of the
//! cache if the result depends on that file.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A computed value together with the files it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub watch_files: BTreeSet<PathBuf>,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, watch_files: BTreeSet<PathBuf>) -> Self {
        Self { value, watch_files }
    }
}

/// Computes the values stored in a [`Cache`].
#[async_trait]
pub trait CacheProvider: Send + Sync + 'static {
    type Key: Clone + Send + Sync + 'static;
    type Value: Clone + Send + Sync + 'static;
    type Context: Clone + Send + Sync + 'static;
    type Error: Clone + Send + Sync + 'static;

    /// Maps a key to the id values are stored under.
    fn cache_id(&self, key: &Self::Key) -> String;

    /// Computes the value for `key`.
    async fn compute(
        &self,
        key: Self::Key,
        context: Self::Context,
    ) -> Result<CacheEntry<Self::Value>, Self::Error>;

    /// Called when a request is answered without running `compute` for it.
    fn on_cached_return(
        &self,
        _key: &Self::Key,
        _entry: &CacheEntry<Self::Value>,
        _context: &Self::Context,
    ) {
    }

    /// Called when a finished value is removed by invalidation.
    fn on_invalidate(&self, _id: &str, _entry: &CacheEntry<Self::Value>) {}
}

type EntryRef<P> = Arc<CacheEntry<<P as CacheProvider>::Value>>;
type Computation<P> = Shared<BoxFuture<'static, Result<EntryRef<P>, <P as CacheProvider>::Error>>>;

struct Pending<P: CacheProvider> {
    job: u64,
    computation: Computation<P>,
    /// Files reported changed since the job started.
    changed: Vec<PathBuf>,
}

struct State<P: CacheProvider> {
    entries: HashMap<String, EntryRef<P>>,
    pending: HashMap<String, Pending<P>>,
    next_job: u64,
}

/// A memoizing cache with single-flight computation.
pub struct Cache<P: CacheProvider> {
    provider: Arc<P>,
    state: Arc<Mutex<State<P>>>,
}

impl<P: CacheProvider> Clone for Cache<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            state: Arc::clone(&self.state),
        }
    }
}

impl<P: CacheProvider> std::fmt::Debug for Cache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Cache")
            .field("entries", &state.entries.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl<P: CacheProvider> Cache<P> {
    /// Create an empty cache backed by `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                pending: HashMap::new(),
                next_job: 0,
            })),
        }
    }

    /// The provider computing this cache's values.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Return the value for `key`, computing it if necessary.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the computation fails. The failure is
    /// not cached; the next call retries.
    pub async fn get(&self, key: P::Key, context: P::Context) -> Result<P::Value, P::Error> {
        let id = self.provider.cache_id(&key);

        let (computation, owned) = {
            let mut state = self.state();
            if let Some(entry) = state.entries.get(&id).cloned() {
                drop(state);
                debug!(%id, "cache hit");
                self.provider.on_cached_return(&key, &entry, &context);
                return Ok(entry.value.clone());
            }
            if let Some(pending) = state.pending.get(&id) {
                debug!(%id, "joining pending computation");
                (pending.computation.clone(), false)
            } else {
                debug!(%id, "cache miss");
                let job = state.next_job;
                state.next_job += 1;
                let computation = self.start(id.clone(), job, key.clone(), context.clone());
                state.pending.insert(
                    id,
                    Pending {
                        job,
                        computation: computation.clone(),
                        changed: Vec::new(),
                    },
                );
                (computation, true)
            }
        };

        let entry = computation.await?;
        if !owned {
            self.provider.on_cached_return(&key, &entry, &context);
        }
        Ok(entry.value.clone())
    }

    /// Remove the value and any pending computation for `key`.
    ///
    /// Returns true if a finished value was removed.
    pub fn invalidate(&self, key: &P::Key) -> bool {
        let id = self.provider.cache_id(key);
        self.invalidate_id(&id)
    }

    /// Invalidate every value that depends on `path`.
    ///
    /// Pending computations remember the change and do not store a result
    /// that depends on `path`. Returns the number of removed finished values.
    pub fn invalidate_watching(&self, path: &Path) -> usize {
        let ids = {
            let mut state = self.state();
            for pending in state.pending.values_mut() {
                pending.changed.push(path.to_path_buf());
            }
            state
                .entries
                .iter()
                .filter(|(_, entry)| entry.watch_files.contains(path))
                .map(|(id, _)| id.clone())
                .collect::<Vec<_>>()
        };
        ids.iter().filter(|id| self.invalidate_id(id)).count()
    }

    /// Drop all values and pending computations.
    pub fn clear(&self) {
        let mut state = self.state();
        state.entries.clear();
        state.pending.clear();
    }

    /// Number of finished values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    /// Returns true if no finished values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn invalidate_id(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.state();
            state.pending.remove(id);
            state.entries.remove(id)
        };
        match removed {
            Some(entry) => {
                debug!(%id, "invalidated cache entry");
                self.provider.on_invalidate(id, &entry);
                true
            }
            None => false,
        }
    }

    /// Build the shared computation for `id`.
    ///
    /// The computation stores its own result, so it is recorded even if the
    /// caller that started it stops polling while others still wait.
    fn start(&self, id: String, job: u64, key: P::Key, context: P::Context) -> Computation<P> {
        let provider = Arc::clone(&self.provider);
        let state = Arc::clone(&self.state);
        async move {
            let result = provider.compute(key, context).await.map(Arc::new);
            let mut state = lock(&state);
            // A concurrent invalidate() may have replaced or removed this job.
            let pending = match state.pending.remove(&id) {
                Some(pending) if pending.job == job => pending,
                Some(other) => {
                    state.pending.insert(id, other);
                    return result;
                }
                None => return result,
            };
            if let Ok(entry) = &result {
                if pending.changed.iter().any(|p| entry.watch_files.contains(p)) {
                    debug!(%id, "discarding result computed from changed files");
                } else {
                    state.entries.insert(id, Arc::clone(entry));
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    fn state(&self) -> MutexGuard<'_, State<P>> {
        lock(&self.state)
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
