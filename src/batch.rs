use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;

use crate::{batch_function::BatchOutput, error::BatchError};

/// Type-erased batch function bound to its context.
pub(crate) type FetchFn<K, V, E> =
    Arc<dyn Fn(Vec<K>) -> BoxFuture<'static, BatchOutput<V, E>> + Send + Sync>;

/// Completion signal of a batch. Fires exactly once; every clone observes the same result.
pub(crate) type Done<V, E> = Shared<oneshot::Receiver<Arc<BatchResult<V, E>>>>;

/// Why a batch stopped accepting keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseReason {
    /// The wait window elapsed.
    Timeout,
    /// The batch reached the configured maximum size.
    Capacity,
}

/// A `Batch` collects the keys requested between its creation and its dispatch.
///
/// A batch moves through three states during its lifetime:
///
/// 1. Open: it sits in the loader's `current` slot and `attach` appends keys to it.
/// 2. Closing: it has been taken out of the `current` slot, so later keys open a fresh batch. Its
///    keys are handed to the batch function exactly once.
/// 3. Completed: the batch function's output has been sent on the completion channel and every
///    `Thunk` attached to the batch can resolve.
///
/// Taking the batch out of the `current` slot happens under the loader's lock, which is what makes
/// the Open to Closing transition happen at most once no matter whether the timer or the size cap
/// gets there first.
pub(crate) struct Batch<K, V, E> {
    id: u64,
    keys: Vec<K>,
    positions: HashMap<K, usize>,
    complete: oneshot::Sender<Arc<BatchResult<V, E>>>,
    done: Done<V, E>,
}

impl<K, V, E> Batch<K, V, E>
where
    K: Eq + Hash + Clone,
{
    pub fn new(id: u64) -> Self {
        let (complete, done) = oneshot::channel();
        Self { id, keys: Vec::new(), positions: HashMap::new(), complete, done: done.shared() }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the position of `key` within this batch, appending it if it is not already present.
    /// The flag is true when `key` is the first key of the batch.
    pub fn attach(&mut self, key: K) -> (usize, bool) {
        if let Some(&index) = self.positions.get(&key) {
            return (index, false);
        }
        let index = self.keys.len();
        self.positions.insert(key.clone(), index);
        self.keys.push(key);
        (index, index == 0)
    }

    pub fn is_full(&self, max_batch_size: usize) -> bool {
        max_batch_size != 0 && self.keys.len() >= max_batch_size
    }

    pub fn done(&self) -> Done<V, E> {
        self.done.clone()
    }

    /// Gives up the keys and the completion sender for dispatch.
    pub fn close(self) -> (Vec<K>, oneshot::Sender<Arc<BatchResult<V, E>>>) {
        (self.keys, self.complete)
    }
}

/// What every thunk attached to a batch reads once the batch completes.
pub(crate) struct BatchResult<V, E> {
    values: Vec<Option<V>>,
    error: Option<BatchError<E>>,
}

impl<V, E> BatchResult<V, E> {
    pub fn new(values: Vec<Option<V>>, error: Option<BatchError<E>>) -> Self {
        Self { values, error }
    }

    /// The value at `index`, or `None` when the batch function left that position empty.
    pub fn value(&self, index: usize) -> Option<&V> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn error(&self) -> Option<&BatchError<E>> {
        self.error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_deduplicates_keys() {
        let mut batch = Batch::<&str, u8, ()>::new(1);
        assert_eq!(batch.attach("a"), (0, true));
        assert_eq!(batch.attach("b"), (1, false));
        assert_eq!(batch.attach("a"), (0, false));
        assert!(batch.is_full(2));

        let (keys, _) = batch.close();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn zero_cap_is_never_full() {
        let mut batch = Batch::<u32, u8, ()>::new(1);
        for key in 0..100 {
            batch.attach(key);
        }
        assert!(!batch.is_full(0));
        assert!(batch.is_full(100));
        assert!(!batch.is_full(101));
    }

    #[tokio::test]
    async fn completion_reaches_every_waiter() {
        let batch = Batch::<u32, &str, ()>::new(7);
        let (first, second) = (batch.done(), batch.done());
        let (_, complete) = batch.close();

        assert!(complete.send(Arc::new(BatchResult::new(vec![Some("x"), None], None))).is_ok());

        let first = first.await.map_err(|_| ()).and_then(|r| r.value(0).copied().ok_or(()));
        assert_eq!(first, Ok("x"));
        let second = second.await.map_err(|_| ());
        assert!(
            matches!(second, Ok(result) if result.value(1).is_none() && result.value(5).is_none())
        );
    }

    #[tokio::test]
    async fn dropped_sender_abandons_waiters() {
        let batch = Batch::<u32, u8, ()>::new(1);
        let done = batch.done();
        drop(batch);
        assert!(done.await.is_err());
    }
}
