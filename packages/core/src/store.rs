//! The key-value store the engine persists its state in.
//!
//! [`StoreCache`] buffers the writes of one operation on top of any [`Store`] and applies them
//! only on [`StoreCache::commit`]; dropping the cache discards them. [`PrefixStore`] scopes an
//! application module to its own key space.

use std::collections::BTreeMap;

use ibc_classic_types::{
    commitment::{sequence_bytes, sequence_from_bytes},
    path::Path,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::IbcError;

/// A byte-keyed store with ordered iteration.
pub trait Store {
    /// Returns the value stored at `key`.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Stores `value` at `key`.
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Removes the value at `key`.
    fn delete(&mut self, key: &[u8]);

    /// Returns every entry whose key starts with `prefix`, in key order.
    fn range_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// An in-memory [`Store`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Vec<u8>)> {
        self.entries.iter()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn range_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Write-back cache over another store.
pub struct StoreCache<'a> {
    inner: &'a mut dyn Store,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> StoreCache<'a> {
    /// Creates an empty cache over `inner`.
    pub fn new(inner: &'a mut dyn Store) -> Self {
        Self {
            inner,
            writes: BTreeMap::new(),
        }
    }

    /// Applies the buffered writes to the underlying store.
    pub fn commit(self) {
        for (key, value) in self.writes {
            match value {
                Some(value) => self.inner.set(key, value),
                None => self.inner.delete(&key),
            }
        }
    }
}

impl Store for StoreCache<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(value) => value.clone(),
            None => self.inner.get(key),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn range_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.inner.range_prefix(prefix).into_iter().collect();
        for (key, value) in self
            .writes
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
        {
            match value {
                Some(value) => merged.insert(key.clone(), value.clone()),
                None => merged.remove(key),
            };
        }
        merged.into_iter().collect()
    }
}

/// A view of another store with every key prefixed.
pub struct PrefixStore<'a> {
    inner: &'a mut dyn Store,
    prefix: Vec<u8>,
}

impl<'a> PrefixStore<'a> {
    /// Scopes `inner` to keys starting with `prefix`.
    pub fn new(inner: &'a mut dyn Store, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    fn key(&self, key: &[u8]) -> Vec<u8> {
        [self.prefix.as_slice(), key].concat()
    }
}

impl Store for PrefixStore<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.get(&self.key(key))
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let key = self.key(&key);
        self.inner.set(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        let key = self.key(key);
        self.inner.delete(&key);
    }

    fn range_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.inner
            .range_prefix(&self.key(prefix))
            .into_iter()
            .map(|(key, value)| (key[self.prefix.len()..].to_vec(), value))
            .collect()
    }
}

/// Reads and decodes a JSON record.
pub(crate) fn read_json<T: DeserializeOwned>(
    store: &dyn Store,
    path: &Path,
) -> Result<Option<T>, IbcError> {
    store
        .get(&path.to_key())
        .map(|bytes| serde_json::from_slice(&bytes).map_err(|e| IbcError::corrupted(path, e)))
        .transpose()
}

/// Encodes and writes a JSON record.
pub(crate) fn write_json<T: Serialize>(
    store: &mut dyn Store,
    path: &Path,
    value: &T,
) -> Result<(), IbcError> {
    let bytes = serde_json::to_vec(value).map_err(|e| IbcError::corrupted(path, e))?;
    store.set(path.to_key(), bytes);
    Ok(())
}

/// Reads an 8-byte big-endian counter.
pub(crate) fn read_u64(store: &dyn Store, key: &[u8]) -> Result<Option<u64>, IbcError> {
    store
        .get(key)
        .map(|bytes| {
            sequence_from_bytes(&bytes).ok_or_else(|| {
                IbcError::corrupted(String::from_utf8_lossy(key), "expected 8 bytes")
            })
        })
        .transpose()
}

/// Writes an 8-byte big-endian counter.
pub(crate) fn write_u64(store: &mut dyn Store, key: &[u8], value: u64) {
    store.set(key.to_vec(), sequence_bytes(value).to_vec());
}

/// Returns the counter at `key` and stores its successor. Counters start at zero.
pub(crate) fn next_counter(store: &mut dyn Store, key: &str) -> Result<u64, IbcError> {
    let current = read_u64(store, key.as_bytes())?.unwrap_or_default();
    let next = current
        .checked_add(1)
        .ok_or_else(|| IbcError::corrupted(key, "counter overflow"))?;
    write_u64(store, key.as_bytes(), next);
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set(b"a/1".to_vec(), b"1".to_vec());
        store.set(b"a/2".to_vec(), b"2".to_vec());
        store.set(b"b/1".to_vec(), b"3".to_vec());
        store
    }

    #[test]
    fn range_prefix_is_bounded() {
        let store = store();
        let keys: Vec<_> = store
            .range_prefix(b"a/")
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a/1".to_vec(), b"a/2".to_vec()]);
    }

    #[test]
    fn cache_overlays_and_commits() {
        let mut store = store();
        {
            let mut cache = StoreCache::new(&mut store);
            cache.set(b"a/3".to_vec(), b"4".to_vec());
            cache.delete(b"a/1");

            assert_eq!(cache.get(b"a/1"), None);
            assert_eq!(cache.get(b"a/3"), Some(b"4".to_vec()));
            let keys: Vec<_> = cache
                .range_prefix(b"a/")
                .into_iter()
                .map(|(k, _)| k)
                .collect();
            assert_eq!(keys, vec![b"a/2".to_vec(), b"a/3".to_vec()]);
            cache.commit();
        }
        assert_eq!(store.get(b"a/1"), None);
        assert_eq!(store.get(b"a/3"), Some(b"4".to_vec()));
    }

    #[test]
    fn dropped_cache_discards_writes() {
        let mut store = store();
        {
            let mut cache = StoreCache::new(&mut store);
            cache.set(b"a/3".to_vec(), b"4".to_vec());
        }
        assert_eq!(store, self::store());
    }

    #[test]
    fn nested_cache_commits_into_parent() {
        let mut store = store();
        let mut outer = StoreCache::new(&mut store);
        {
            let mut inner = StoreCache::new(&mut outer);
            inner.set(b"c".to_vec(), b"5".to_vec());
            inner.commit();
        }
        {
            let mut discarded = StoreCache::new(&mut outer);
            discarded.set(b"d".to_vec(), b"6".to_vec());
        }
        assert_eq!(outer.get(b"c"), Some(b"5".to_vec()));
        assert_eq!(outer.get(b"d"), None);
    }

    #[test]
    fn prefix_store_is_scoped() {
        let mut store = store();
        {
            let mut scoped = PrefixStore::new(&mut store, b"apps/transfer/".to_vec());
            scoped.set(b"balance".to_vec(), b"10".to_vec());
            assert_eq!(scoped.get(b"balance"), Some(b"10".to_vec()));
            assert_eq!(scoped.get(b"a/1"), None);
            assert_eq!(scoped.range_prefix(b"").len(), 1);
        }
        assert_eq!(store.get(b"apps/transfer/balance"), Some(b"10".to_vec()));
    }

    #[test]
    fn counters() {
        let mut store = MemoryStore::new();
        assert_eq!(next_counter(&mut store, "next").unwrap(), 0);
        assert_eq!(next_counter(&mut store, "next").unwrap(), 1);
        assert_eq!(read_u64(&store, b"next").unwrap(), Some(2));

        store.set(b"next".to_vec(), vec![1]);
        assert!(matches!(
            read_u64(&store, b"next"),
            Err(IbcError::CorruptedState { .. })
        ));
    }

    #[test]
    fn exhausted_counter_is_corrupted() {
        let mut store = MemoryStore::new();
        write_u64(&mut store, b"next", u64::MAX);
        assert!(matches!(
            next_counter(&mut store, "next"),
            Err(IbcError::CorruptedState { .. })
        ));
        assert_eq!(read_u64(&store, b"next").unwrap(), Some(u64::MAX));
    }
}
