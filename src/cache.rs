use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Storage for values a `Loader` has resolved or been primed with.
///
/// Entries live until they are removed explicitly; there is no eviction.
pub trait Cache {
    type K;
    type V;

    fn get(&self, key: &Self::K) -> Option<&Self::V>;

    /// Inserts or overwrites the value for `key`.
    fn insert(&mut self, key: Self::K, value: Self::V);

    /// Inserts only when `key` is absent. Returns whether the value was stored.
    fn insert_if_absent(&mut self, key: Self::K, value: Self::V) -> bool;

    fn remove(&mut self, key: &Self::K);
}

impl<K, V, S: BuildHasher> Cache for HashMap<K, V, S>
where
    K: Eq + Hash,
{
    type K = K;
    type V = V;

    fn get(&self, key: &Self::K) -> Option<&Self::V> {
        HashMap::get(self, key)
    }

    fn insert(&mut self, key: Self::K, value: Self::V) {
        HashMap::insert(self, key, value);
    }

    fn insert_if_absent(&mut self, key: Self::K, value: Self::V) -> bool {
        match self.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    fn remove(&mut self, key: &Self::K) {
        HashMap::remove(self, key);
    }
}
