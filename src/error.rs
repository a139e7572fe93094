use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Renders the errors of one batch into the aggregate message.
pub type ErrorFormatter<E> = Arc<dyn Fn(&[E]) -> String + Send + Sync>;

/// Outcome of resolving a single key. `Ok(None)` means the batch function reported the key as
/// absent.
pub type LoadResult<V, E> = Result<Option<V>, LoadError<V, E>>;

/// Every error reported by one batch, combined into a single value.
///
/// The same aggregate is handed to every caller attached to the failed batch, regardless of which
/// key the individual errors belonged to.
pub struct BatchError<E> {
    errors: Arc<[E]>,
    message: Arc<str>,
}

impl<E> BatchError<E> {
    pub(crate) fn new(errors: Vec<E>, message: String) -> Self {
        Self { errors: errors.into(), message: message.into() }
    }

    /// The individual errors in batch order.
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl<E> Clone for BatchError<E> {
    fn clone(&self) -> Self {
        Self { errors: Arc::clone(&self.errors), message: Arc::clone(&self.message) }
    }
}

impl<E> fmt::Debug for BatchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchError")
            .field("count", &self.errors.len())
            .field("message", &self.message)
            .finish()
    }
}

impl<E> fmt::Display for BatchError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl<E> Error for BatchError<E> {}

/// Error returned to a caller of [`crate::Loader::load`] and friends.
pub enum LoadError<V, E> {
    /// The batch this key was attached to reported at least one error. `value` is whatever the
    /// batch function returned at this key's own position, which may still be present.
    Batch { error: BatchError<E>, value: Option<V> },
    /// The batch's completion signal was dropped before it fired, e.g. because the fetch task
    /// panicked or the runtime shut down.
    Abandoned,
}

impl<V, E> LoadError<V, E> {
    /// The aggregate batch error, if any.
    pub fn batch_error(&self) -> Option<&BatchError<E>> {
        match self {
            LoadError::Batch { error, .. } => Some(error),
            LoadError::Abandoned => None,
        }
    }

    /// This caller's positional value from the failed batch.
    pub fn value(&self) -> Option<&V> {
        match self {
            LoadError::Batch { value, .. } => value.as_ref(),
            LoadError::Abandoned => None,
        }
    }

    pub fn into_value(self) -> Option<V> {
        match self {
            LoadError::Batch { value, .. } => value,
            LoadError::Abandoned => None,
        }
    }
}

impl<V, E> Clone for LoadError<V, E>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        match self {
            LoadError::Batch { error, value } => {
                LoadError::Batch { error: error.clone(), value: value.clone() }
            }
            LoadError::Abandoned => LoadError::Abandoned,
        }
    }
}

impl<V, E> fmt::Debug for LoadError<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Batch { error, value } => f
                .debug_struct("Batch")
                .field("error", error)
                .field("has_value", &value.is_some())
                .finish(),
            LoadError::Abandoned => write!(f, "Abandoned"),
        }
    }
}

impl<V, E> fmt::Display for LoadError<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Batch { error, .. } => fmt::Display::fmt(error, f),
            LoadError::Abandoned => f.write_str("batch was dropped before its fetch completed"),
        }
    }
}

impl<V, E: 'static> Error for LoadError<V, E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LoadError::Batch { error, .. } => Some(error),
            LoadError::Abandoned => None,
        }
    }
}

/// Default aggregate rendering.
///
/// A single error renders as its own message. Several errors are grouped by message, counted and
/// listed most frequent first under a header with the total count.
pub fn format_errors<E: fmt::Display>(errors: &[E]) -> String {
    if let [only] = errors {
        return only.to_string();
    }

    let mut occurrences: Vec<(String, usize)> = Vec::new();
    for message in errors.iter().map(ToString::to_string) {
        match occurrences.iter_mut().find(|(seen, _)| *seen == message) {
            Some((_, count)) => *count += 1,
            None => occurrences.push((message, 1)),
        }
    }
    // Stable, so equal counts keep first-seen order.
    occurrences.sort_by(|a, b| b.1.cmp(&a.1));

    let mut listing = String::new();
    for (message, count) in &occurrences {
        listing.push_str(&format!(" * {} {}\n", count, message));
    }
    format!("{} errors occurred:\n{}\n", errors.len(), listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_error_is_its_own_message() {
        assert_eq!(format_errors(&["boom"]), "boom");
    }

    #[test]
    fn repeated_errors_are_grouped_by_frequency() {
        let errors = ["timeout", "not allowed", "timeout", "gone", "timeout", "not allowed"];
        assert_eq!(
            format_errors(&errors),
            "6 errors occurred:\n * 3 timeout\n * 2 not allowed\n * 1 gone\n\n"
        );
    }

    #[test]
    fn ties_keep_first_seen_order() {
        assert_eq!(format_errors(&["b", "a"]), "2 errors occurred:\n * 1 b\n * 1 a\n\n");
    }

    #[test]
    fn load_error_exposes_aggregate_and_value() {
        let error = BatchError::new(vec!["boom"], "boom".to_owned());
        let load_error: LoadError<u8, &str> = LoadError::Batch { error, value: Some(7) };

        assert_eq!(load_error.to_string(), "boom");
        assert_eq!(load_error.value(), Some(&7));
        assert_eq!(load_error.batch_error().map(BatchError::len), Some(1));
        assert!(load_error.source().is_some());
        assert_eq!(LoadError::<u8, &str>::Abandoned.into_value(), None);
    }
}
