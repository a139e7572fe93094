use async_trait::async_trait;

/// A `BatchFunction` defines the method through which some `Loader` fetches batched data from
/// some resource. The `BatchFunction` receives a slice of distinct keys, in the order they were
/// attached to the batch, and some user defined context struct.
///
/// The returned [`BatchOutput`] holds two sequences parallel to `keys`: `values[i]` and
/// `errors[i]` describe `keys[i]`. Absence is encoded as a `None` value with a `None` error. A
/// sequence shorter than `keys` is tolerated; missing positions read as `None`.
///
/// Multiple `BatchFunctions` (and therefore loaders) can share the same context (likely through an
/// `Arc`).
#[async_trait]
pub trait BatchFunction<K, V> {
    type Context;
    type Error;
    async fn load(keys: &[K], context: &Self::Context) -> BatchOutput<V, Self::Error>;
}

/// Values and errors produced by one invocation of a [`BatchFunction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutput<V, E> {
    pub values: Vec<Option<V>>,
    pub errors: Vec<Option<E>>,
}

impl<V, E> BatchOutput<V, E> {
    pub fn new(values: Vec<Option<V>>, errors: Vec<Option<E>>) -> Self {
        Self { values, errors }
    }

    /// Builds an output for a resource that cannot fail.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<V>>,
    {
        let values = values.into_iter().collect::<Vec<_>>();
        let errors = std::iter::repeat_with(|| None).take(values.len()).collect();
        Self { values, errors }
    }

    /// Splits per-key results into the two parallel sequences.
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<V, E>>,
    {
        let (values, errors) = results
            .into_iter()
            .map(|result| match result {
                Ok(value) => (Some(value), None),
                Err(e) => (None, Some(e)),
            })
            .unzip();
        Self { values, errors }
    }

    pub(crate) fn into_parts(self) -> (Vec<Option<V>>, Vec<E>) {
        (self.values, self.errors.into_iter().flatten().collect())
    }
}
