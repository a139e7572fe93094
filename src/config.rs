use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{format_errors, ErrorFormatter};

/// How long a batch accumulates keys when no size cap closes it first.
pub const DEFAULT_WAIT: Duration = Duration::from_millis(16);

/// Construction-time settings of a [`crate::Loader`].
pub struct LoaderConfig<E> {
    /// Time from the first key attached to a batch until that batch is dispatched.
    pub wait: Duration,
    /// Maximum number of keys handed to one batch function call. `0` means unbounded.
    pub max_batch_size: usize,
    /// Overrides [`format_errors`] when rendering a batch's aggregate error. Only consulted when
    /// the batch reported two or more errors.
    pub error_formatter: Option<ErrorFormatter<E>>,
}

impl<E> LoaderConfig<E> {
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_error_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&[E]) -> String + Send + Sync + 'static,
    {
        self.error_formatter = Some(Arc::new(formatter));
        self
    }

    /// A lone error always renders as its own message; the formatter only sees two or more.
    pub(crate) fn render_errors(&self, errors: &[E]) -> String
    where
        E: fmt::Display,
    {
        if let [only] = errors {
            return only.to_string();
        }
        match &self.error_formatter {
            Some(formatter) => formatter(errors),
            None => format_errors(errors),
        }
    }
}

impl<E> Default for LoaderConfig<E> {
    fn default() -> Self {
        Self { wait: DEFAULT_WAIT, max_batch_size: 0, error_formatter: None }
    }
}

impl<E> Clone for LoaderConfig<E> {
    fn clone(&self) -> Self {
        Self {
            wait: self.wait,
            max_batch_size: self.max_batch_size,
            error_formatter: self.error_formatter.clone(),
        }
    }
}

impl<E> fmt::Debug for LoaderConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderConfig")
            .field("wait", &self.wait)
            .field("max_batch_size", &self.max_batch_size)
            .field("custom_error_formatter", &self.error_formatter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_formatter_replaces_default() {
        let config = LoaderConfig::<&str>::default()
            .with_max_batch_size(4)
            .with_error_formatter(|errors| format!("{} failures", errors.len()));
        assert_eq!(config.max_batch_size, 4);
        assert_eq!(config.wait, DEFAULT_WAIT);
        assert_eq!(config.render_errors(&["a", "b"]), "2 failures");
        assert_eq!(LoaderConfig::<&str>::default().render_errors(&["a"]), "a");
    }

    #[test]
    fn custom_formatter_skips_single_error() {
        let config = LoaderConfig::<&str>::default().with_error_formatter(|_| "custom".to_owned());
        assert_eq!(config.render_errors(&["only"]), "only");
        assert_eq!(config.render_errors(&["a", "a"]), "custom");
    }
}
