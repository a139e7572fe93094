use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{self, FutureExt, JoinAll};
use parking_lot::Mutex;
use tracing_futures::Instrument;

use crate::{
    batch::{Batch, BatchResult, CloseReason, Done, FetchFn},
    batch_function::BatchFunction,
    cache::Cache,
    config::LoaderConfig,
    error::BatchError,
    stats::LoaderStats,
    thunk::Thunk,
};

/// Batch loads values from some expensive resource, primarily intended for mitigating the N+1
/// query problem.
///
/// Users can call [`Loader::load`] and [`Loader::load_all`] to fetch values from the underlying
/// resource or cache. Values can be added to the cache out-of-band with [`Loader::prime`] and
/// removed with [`Loader::clear`].
///
/// Keys that miss the cache are attached to the currently open batch. A batch is dispatched to the
/// [`BatchFunction`] once its wait window elapses or once it holds `max_batch_size` keys,
/// whichever happens first; keys arriving after that open the next batch. Callers can invoke the
/// `Loader` from any number of parallel tasks; share it through an `Arc`.
///
/// Errors are batch-wide: if the batch function reports an error for any key of a batch, every
/// caller attached to that batch receives the same aggregate [`crate::BatchError`] and nothing
/// from that batch is cached, including keys whose own position held a value.
///
/// Loads must be issued from within a Tokio runtime, which runs the batch timers and fetches.
pub struct Loader<K, V, E> {
    inner: Arc<LoaderInner<K, V, E>>,
}

/// Shared between the `Loader`, its timers and fetch tasks, and pending thunks.
pub(crate) struct LoaderInner<K, V, E> {
    state: Mutex<State<K, V, E>>,
    fetch: FetchFn<K, V, E>,
    config: LoaderConfig<E>,
}

/// Everything the loader's lock guards. The cache and the current batch are only ever touched
/// together under that lock.
struct State<K, V, E> {
    cache: HashMap<K, Option<V>>,
    current: Option<Batch<K, V, E>>,
    last_batch_id: u64,
    stats: LoaderStats,
}

pub(crate) enum Attachment<V, E> {
    Cached(Option<V>),
    Pending { index: usize, done: Done<V, E> },
}

impl<K, V, E> Loader<K, V, E>
where
    K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    V: 'static + Clone + Send + Sync,
    E: 'static + Display + Send + Sync,
{
    /// Creates a new Loader for the provided BatchFunction and Context type, using the default
    /// [`LoaderConfig`].
    ///
    /// Note: the batch function is passed in as a marker for type inference.
    pub fn new<F, ContextT>(batch_fn: F, context: ContextT) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT, Error = E>,
    {
        Self::with_config(batch_fn, context, LoaderConfig::default())
    }

    /// Creates a new Loader with an explicit wait window, size cap and error formatter.
    pub fn with_config<F, ContextT>(_: F, context: ContextT, config: LoaderConfig<E>) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT, Error = E>,
    {
        let context = Arc::new(context);
        let fetch: FetchFn<K, V, E> = Arc::new(move |keys: Vec<K>| {
            let context = Arc::clone(&context);
            async move { F::load(&keys, &*context).await }.boxed()
        });
        Self {
            inner: Arc::new(LoaderInner {
                state: Mutex::new(State {
                    cache: HashMap::new(),
                    current: None,
                    last_batch_id: 0,
                    stats: LoaderStats::default(),
                }),
                fetch,
                config,
            }),
        }
    }

    /// Loads a value from the underlying resource.
    ///
    /// Returns `Ok(None)` if the batch function reported the key as absent. If the value is
    /// already in the cache it is returned without waiting for a batch.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime when `key` is not cached, since opening or
    /// dispatching a batch spawns tasks.
    #[tracing::instrument(level = "trace", skip(self))]
    pub async fn load(&self, key: K) -> crate::LoadResult<V, E> {
        self.load_thunk(key).await
    }

    /// Attaches `key` to the current batch right away and returns a future that resolves once that
    /// batch completes.
    ///
    /// Use this when one task wants to request keys from several loaders before awaiting any of
    /// them, so that every request makes it into the same batching window.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime when `key` is not cached, since opening or
    /// dispatching a batch spawns tasks.
    pub fn load_thunk(&self, key: K) -> Thunk<V, E> {
        match self.inner.attach(key.clone()) {
            Attachment::Cached(value) => Thunk::ready(Ok(value)),
            Attachment::Pending { index, done } => {
                Thunk::pending(Arc::clone(&self.inner), key, index, done)
            }
        }
    }

    /// Loads many values at once. Results are in the order of `keys`.
    ///
    /// Every key is attached before any of them is awaited, so keys requested together share a
    /// batch unless the size cap splits them.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime when any key is not cached.
    #[tracing::instrument(level = "trace", skip_all)]
    pub async fn load_all<I>(&self, keys: I) -> Vec<crate::LoadResult<V, E>>
    where
        I: IntoIterator<Item = K>,
    {
        self.load_all_thunk(keys).await
    }

    /// Attaches every key and returns a single future resolving all of them together.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime when any key is not cached.
    pub fn load_all_thunk<I>(&self, keys: I) -> JoinAll<Thunk<V, E>>
    where
        I: IntoIterator<Item = K>,
    {
        let thunks = keys.into_iter().map(|key| self.load_thunk(key)).collect::<Vec<_>>();
        future::join_all(thunks)
    }

    /// Adds a copy of `value` to the cache unless `key` is already cached.
    ///
    /// Returns false, leaving the cache untouched, if the key was present. To force a value, call
    /// [`Loader::clear`] first.
    #[tracing::instrument(level = "trace", skip(self, value))]
    pub fn prime(&self, key: K, value: &V) -> bool {
        self.inner.state.lock().cache.insert_if_absent(key, Some(value.clone()))
    }

    /// Adds many values to the cache at once. Returns how many were inserted.
    pub fn prime_many<I>(&self, key_vals: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut state = self.inner.state.lock();
        key_vals
            .into_iter()
            .filter(|(key, value)| state.cache.insert_if_absent(key.clone(), Some(value.clone())))
            .count()
    }

    /// Removes a value from the cache.
    ///
    /// This key will be reloaded when it is next requested.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn clear(&self, key: &K) {
        Cache::remove(&mut self.inner.state.lock().cache, key);
    }

    /// Removes multiple values from the cache at once.
    pub fn clear_many<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a K>,
    {
        let mut state = self.inner.state.lock();
        for key in keys {
            Cache::remove(&mut state.cache, key);
        }
    }

    /// A snapshot of this loader's counters.
    pub fn stats(&self) -> LoaderStats {
        self.inner.state.lock().stats.clone()
    }
}

impl<K, V, E> LoaderInner<K, V, E>
where
    K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    V: 'static + Clone + Send + Sync,
    E: 'static + Display + Send + Sync,
{
    /// Answers `key` from the cache or attaches it to the open batch, opening one if needed.
    fn attach(self: &Arc<Self>, key: K) -> Attachment<V, E> {
        let mut state = self.state.lock();
        if let Some(value) = Cache::get(&state.cache, &key) {
            let value = value.clone();
            state.stats.record_load_request(true);
            return Attachment::Cached(value);
        }
        state.stats.record_load_request(false);

        let State { current, last_batch_id, .. } = &mut *state;
        let batch = current.get_or_insert_with(|| {
            *last_batch_id += 1;
            Batch::new(*last_batch_id)
        });
        let (index, opened) = batch.attach(key);
        let done = batch.done();
        let id = batch.id();
        let full = batch.is_full(self.config.max_batch_size);
        let closed = if full { current.take() } else { None };
        drop(state);

        if opened {
            tracing::debug!(batch = id, "opened batch");
            self.start_timer(id);
        }
        if let Some(batch) = closed {
            let span = tracing::debug_span!("batch", id);
            tokio::spawn(Arc::clone(self).dispatch(batch, CloseReason::Capacity).instrument(span));
        }
        Attachment::Pending { index, done }
    }

    /// Closes batch `id` once the wait window has elapsed, unless the size cap already did.
    fn start_timer(self: &Arc<Self>, id: u64) {
        let inner = Arc::clone(self);
        let span = tracing::debug_span!("batch", id);
        tokio::spawn(
            async move {
                tokio::time::sleep(inner.config.wait).await;
                let batch = {
                    let mut state = inner.state.lock();
                    if state.current.as_ref().map(|batch| batch.id()) == Some(id) {
                        state.current.take()
                    } else {
                        None
                    }
                };
                if let Some(batch) = batch {
                    inner.dispatch(batch, CloseReason::Timeout).await;
                }
            }
            .instrument(span),
        );
    }

    /// Runs the batch function for a closed batch and publishes its output. The lock is never held
    /// while the batch function runs.
    async fn dispatch(self: Arc<Self>, batch: Batch<K, V, E>, reason: CloseReason) {
        let id = batch.id();
        let (keys, complete) = batch.close();
        let size = keys.len();
        tracing::debug!(batch = id, keys = size, ?reason, "dispatching batch");
        self.state.lock().stats.record_batch(size);

        let (values, errors) = (self.fetch)(keys).await.into_parts();
        let error = if errors.is_empty() {
            None
        } else {
            let message = self.config.render_errors(&errors);
            tracing::warn!(
                batch = id,
                errors = errors.len(),
                %message,
                "batch completed with errors"
            );
            self.state.lock().stats.record_failed_batch();
            Some(BatchError::new(errors, message))
        };

        if complete.send(Arc::new(BatchResult::new(values, error))).is_err() {
            tracing::debug!(batch = id, "no thunk is waiting on this batch");
        }
    }

    /// Caches a resolved value. Called by thunks of batches that completed without errors.
    pub(crate) fn write_back(&self, key: K, value: Option<V>) {
        Cache::insert(&mut self.state.lock().cache, key, value);
    }
}

impl<K, V, E> Drop for LoaderInner<K, V, E> {
    fn drop(&mut self) {
        tracing::debug!(loader_stats = ?self.state.get_mut().stats);
    }
}
