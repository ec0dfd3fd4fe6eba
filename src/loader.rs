//! Request-scoped batching loader.
//!
//! A [`BatchLoader`] collapses the id lookups issued while one query is
//! resolved into as few store round trips as possible:
//!
//! - a key already resolved in this pass is answered from the cache,
//! - a key already queued or in flight joins the pending lookup,
//! - every other key is queued, and the first key of a window schedules one
//!   dispatch task that waits `batch_delay` for siblings to join and then
//!   fetches the whole queue with a single "id in {keys}" query.
//!
//! Results are handed back by key, never by position. A failed fetch is
//! delivered to every waiter of that batch; nothing is retried.
//!
//! The cache lives as long as the loader. Create one per request and call
//! [`BatchLoader::clear`] after writing a document it may hold.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::debug;

use crate::storage::{Document, DocumentStore, StorageError};
use crate::superpower::Superpower;

/// Source of values for a [`BatchLoader`].
#[async_trait]
pub trait BatchFetch: Send + Sync + 'static {
    /// Lookup key.
    type Key: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    /// Loaded value.
    type Value: Clone + Send + Sync + 'static;

    /// Fetches every key in one round trip. Missing keys are simply absent
    /// from the returned map.
    async fn fetch(
        &self,
        keys: &[Self::Key],
    ) -> Result<HashMap<Self::Key, Self::Value>, StorageError>;
}

/// Fetches documents by id from a [`DocumentStore`].
pub struct FetchById<D: Document> {
    store: Arc<dyn DocumentStore<D>>,
    _kind: PhantomData<fn() -> D>,
}

impl<D: Document> FetchById<D> {
    /// Wraps a store handle.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore<D>>) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<D: Document> BatchFetch for FetchById<D> {
    type Key = D::Id;
    type Value = D;

    async fn fetch(&self, keys: &[D::Id]) -> Result<HashMap<D::Id, D>, StorageError> {
        let found = self.store.find(&D::id_in(keys.to_vec())).await?;
        Ok(found.into_iter().map(|doc| (doc.id(), doc)).collect())
    }
}

/// Loader for superpowers referenced by cosmonauts.
pub type SuperpowerLoader = BatchLoader<FetchById<Superpower>>;

/// Batching knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// How long a dispatch waits for more keys. Zero yields to the scheduler
    /// once instead of sleeping.
    pub batch_delay: Duration,
    /// Largest number of keys sent in one fetch.
    pub max_batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_millis(1),
            max_batch_size: 100,
        }
    }
}

type Waiter<V> = oneshot::Sender<Result<Option<V>, StorageError>>;

struct LoaderState<K, V> {
    cache: HashMap<K, V>,
    /// Waiters per key, for keys queued or in flight.
    waiters: HashMap<K, Vec<Waiter<V>>>,
    /// Keys not yet handed to a dispatch.
    queue: Vec<K>,
    dispatch_scheduled: bool,
}

impl<K, V> Default for LoaderState<K, V> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
            waiters: HashMap::new(),
            queue: Vec::new(),
            dispatch_scheduled: false,
        }
    }
}

/// Deduplicating, caching, batching loader. See the module docs.
pub struct BatchLoader<F: BatchFetch> {
    fetcher: Arc<F>,
    state: Arc<Mutex<LoaderState<F::Key, F::Value>>>,
    config: LoaderConfig,
}

impl<F: BatchFetch> Clone for BatchLoader<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            state: Arc::clone(&self.state),
            config: self.config,
        }
    }
}

impl<F: BatchFetch> fmt::Debug for BatchLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchLoader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn lock_state<K, V>(
    state: &Mutex<LoaderState<K, V>>,
) -> Result<MutexGuard<'_, LoaderState<K, V>>, StorageError> {
    state
        .lock()
        .map_err(|_| StorageError::BackendError("poisoned lock: loader.state".to_string()))
}

impl<F: BatchFetch> BatchLoader<F> {
    /// Creates a loader with an empty cache.
    #[must_use]
    pub fn new(fetcher: F, config: LoaderConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            state: Arc::new(Mutex::new(LoaderState::default())),
            config,
        }
    }

    /// Loads one value. `Ok(None)` means the store has no such key.
    ///
    /// # Errors
    /// The store error of the batch this key was fetched in.
    pub async fn load(&self, key: F::Key) -> Result<Option<F::Value>, StorageError> {
        let receiver = {
            let mut state = lock_state(&self.state)?;
            if let Some(value) = state.cache.get(&key) {
                return Ok(Some(value.clone()));
            }
            self.enqueue(&mut state, key)
        };

        receiver.await.map_err(|_| dispatch_dropped())?
    }

    /// Loads several values with one queue registration.
    ///
    /// The result holds only the keys that exist, keyed by id.
    ///
    /// # Errors
    /// The first store error among the batches the keys were fetched in.
    pub async fn load_many(
        &self,
        keys: &[F::Key],
    ) -> Result<HashMap<F::Key, F::Value>, StorageError> {
        let mut found = HashMap::with_capacity(keys.len());
        let mut pending = Vec::new();
        {
            let mut state = lock_state(&self.state)?;
            for &key in keys {
                if found.contains_key(&key) {
                    continue;
                }
                if let Some(value) = state.cache.get(&key) {
                    found.insert(key, value.clone());
                } else if !pending.iter().any(|(k, _)| *k == key) {
                    let receiver = self.enqueue(&mut state, key);
                    pending.push((key, receiver));
                }
            }
        }

        for (key, receiver) in pending {
            if let Some(value) = receiver.await.map_err(|_| dispatch_dropped())?? {
                found.insert(key, value);
            }
        }
        Ok(found)
    }

    /// Evicts one cached value so the next load refetches it.
    pub fn clear(&self, key: &F::Key) {
        if let Ok(mut state) = lock_state(&self.state) {
            state.cache.remove(key);
        }
    }

    /// Evicts every cached value.
    pub fn clear_all(&self) {
        if let Ok(mut state) = lock_state(&self.state) {
            state.cache.clear();
        }
    }

    /// Seeds the cache unless the key is already cached.
    pub fn prime(&self, key: F::Key, value: F::Value) {
        if let Ok(mut state) = lock_state(&self.state) {
            state.cache.entry(key).or_insert(value);
        }
    }

    /// Registers a waiter for `key`, queueing it and scheduling a dispatch if
    /// nobody has yet.
    fn enqueue(
        &self,
        state: &mut LoaderState<F::Key, F::Value>,
        key: F::Key,
    ) -> oneshot::Receiver<Result<Option<F::Value>, StorageError>> {
        let (sender, receiver) = oneshot::channel();
        match state.waiters.get_mut(&key) {
            Some(waiters) => waiters.push(sender),
            None => {
                state.waiters.insert(key, vec![sender]);
                state.queue.push(key);
            }
        }

        if !state.dispatch_scheduled {
            state.dispatch_scheduled = true;
            tokio::spawn(dispatch(
                Arc::clone(&self.fetcher),
                Arc::clone(&self.state),
                self.config,
            ));
        }
        receiver
    }
}

fn dispatch_dropped() -> StorageError {
    StorageError::BackendError("batch dispatch ended without a result".to_string())
}

async fn dispatch<F: BatchFetch>(
    fetcher: Arc<F>,
    state: Arc<Mutex<LoaderState<F::Key, F::Value>>>,
    config: LoaderConfig,
) {
    if config.batch_delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(config.batch_delay).await;
    }

    let keys = match lock_state(&state) {
        Ok(mut guard) => {
            guard.dispatch_scheduled = false;
            std::mem::take(&mut guard.queue)
        }
        // Waiters are dropped with the poisoned state and see `dispatch_dropped`.
        Err(_) => return,
    };

    for chunk in keys.chunks(config.max_batch_size.max(1)) {
        debug!(keys = chunk.len(), "dispatching batched fetch");
        let result = fetcher.fetch(chunk).await;

        let Ok(mut guard) = lock_state(&state) else {
            return;
        };
        match result {
            Ok(mut found) => {
                for key in chunk {
                    let value = found.remove(key);
                    if let Some(value) = &value {
                        guard.cache.insert(*key, value.clone());
                    }
                    for waiter in guard.waiters.remove(key).unwrap_or_default() {
                        let _ = waiter.send(Ok(value.clone()));
                    }
                }
            }
            Err(err) => {
                debug!(keys = chunk.len(), error = %err, "batched fetch failed");
                for key in chunk {
                    for waiter in guard.waiters.remove(key).unwrap_or_default() {
                        let _ = waiter.send(Err(err.clone()));
                    }
                }
            }
        }
    }
}
