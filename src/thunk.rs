use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture, FutureExt};

use crate::{
    batch::Done,
    error::{LoadError, LoadResult},
    loader::LoaderInner,
};

/// A deferred load returned by [`crate::Loader::load_thunk`].
///
/// The key was attached to a batch when the thunk was created; awaiting the thunk waits for that
/// batch to complete and yields this key's result. Successful results are written to the loader's
/// cache when the thunk resolves.
#[must_use = "a thunk does nothing unless awaited"]
pub struct Thunk<V, E> {
    inner: BoxFuture<'static, LoadResult<V, E>>,
}

impl<V, E> Thunk<V, E>
where
    V: 'static + Clone + Send + Sync,
    E: 'static + Display + Send + Sync,
{
    pub(crate) fn ready(result: LoadResult<V, E>) -> Self {
        Self { inner: future::ready(result).boxed() }
    }

    pub(crate) fn pending<K>(
        loader: Arc<LoaderInner<K, V, E>>,
        key: K,
        index: usize,
        done: Done<V, E>,
    ) -> Self
    where
        K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    {
        Self { inner: resolve(loader, key, index, done).boxed() }
    }
}

async fn resolve<K, V, E>(
    loader: Arc<LoaderInner<K, V, E>>,
    key: K,
    index: usize,
    done: Done<V, E>,
) -> LoadResult<V, E>
where
    K: 'static + Eq + Hash + Clone + Debug + Send + Sync,
    V: 'static + Clone + Send + Sync,
    E: 'static + Display + Send + Sync,
{
    let result = done.await.map_err(|_| LoadError::<V, E>::Abandoned)?;
    let value = result.value(index).cloned();
    if let Some(error) = result.error() {
        return Err(LoadError::Batch { error: error.clone(), value });
    }
    loader.write_back(key, value.clone());
    Ok(value)
}

impl<V, E> Future for Thunk<V, E> {
    type Output = LoadResult<V, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<V, E> Debug for Thunk<V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thunk").finish_non_exhaustive()
    }
}
