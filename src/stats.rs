/// Counters describing how a `Loader` has been used. Obtained through [`crate::Loader::stats`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoaderStats {
    /// Number of keys requested through `load_thunk` (and everything built on it).
    pub load_requests: u64,
    /// The number of requested keys that were answered straight from the cache.
    pub cache_hits: u64,
    /// Number of times the batch function was invoked.
    pub batches: u64,
    /// Total number of keys handed to the batch function.
    pub keys_fetched: u64,
    /// The largest number of keys fetched in a single batch.
    pub max_batch_size: usize,
    /// The smallest number of keys fetched in a single batch. Zero until a batch runs.
    pub min_batch_size: usize,
    /// Batches that reported at least one error.
    pub failed_batches: u64,
}

impl LoaderStats {
    pub(crate) fn record_load_request(&mut self, cache_hit: bool) {
        self.load_requests += 1;
        if cache_hit {
            self.cache_hits += 1;
        }
    }

    pub(crate) fn record_batch(&mut self, batch_size: usize) {
        if self.batches == 0 || batch_size < self.min_batch_size {
            self.min_batch_size = batch_size;
        }
        self.max_batch_size = self.max_batch_size.max(batch_size);
        self.batches += 1;
        self.keys_fetched += batch_size as u64;
    }

    pub(crate) fn record_failed_batch(&mut self) {
        self.failed_batches += 1;
    }

    /// Average number of keys per batch function call.
    pub fn average_batch_size(&self) -> f64 {
        if self.batches == 0 {
            return 0.0;
        }
        self.keys_fetched as f64 / self.batches as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_sizes_are_tracked() {
        let mut stats = LoaderStats::default();
        stats.record_batch(3);
        stats.record_batch(1);
        stats.record_batch(5);
        assert_eq!(stats.min_batch_size, 1);
        assert_eq!(stats.max_batch_size, 5);
        assert_eq!(stats.keys_fetched, 9);
        assert_eq!(stats.average_batch_size(), 3.0);
    }
}
