use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use super::{Entry, Store};
use crate::error::StoreError;

/// In-memory [`Store`] that lives as long as the process.
///
/// One mutex guards the whole map and every operation holds it from start
/// to finish, so the expiry check in [`get`](MemoryStore::get) and the
/// removal it triggers are atomic with respect to a concurrent `insert` of
/// a fresh value under the same key. Expired entries are only reclaimed
/// when read or by [`purge_expired`](MemoryStore::purge_expired); there is
/// no background sweep.
#[derive(Debug)]
pub struct MemoryStore<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> MemoryStore<V> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// Inserts or overwrites `key`. A zero `ttl` never expires.
    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.lock().insert(key.into(), Entry::new(value, ttl));
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();

        let expired = entries.get(key)?.is_expired_at(Instant::now());
        if expired {
            entries.remove(key);
            trace!(key, "expired entry removed on read");
            return None;
        }

        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Removes `key`, returning its value if it was present (expired or not).
    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.lock().remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    /// Keeps only the entries for which `keep` returns `true`, expired or
    /// not. Returns how many were removed.
    pub fn retain(&self, mut keep: impl FnMut(&str, &V) -> bool) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, entry| keep(key, &entry.value));
        before - entries.len()
    }
}

impl<V: Clone> Default for MemoryStore<V> {
    fn default() -> Self { Self::new() }
}

impl<V> Store<V> for MemoryStore<V>
where
    V: Clone + Send + 'static,
{
    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), StoreError> {
        self.insert(key, value, ttl);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<V> {
        MemoryStore::get(self, key)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        MemoryStore::clear(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn set_then_get() {
        let store = MemoryStore::new();
        store.insert("k", 1, MINUTE);
        assert_eq!(store.get("k"), Some(1));
        assert_eq!(store.get("other"), None);
    }

    #[test]
    fn overwrite_replaces_value_and_ttl() {
        let store = MemoryStore::new();
        store.insert("k", 1, MINUTE);
        store.insert("k", 2, Duration::ZERO);
        assert_eq!(store.get("k"), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_reads_as_absent_and_is_removed() {
        let store = MemoryStore::new();
        store.insert("k", "v", MINUTE);
        assert_eq!(store.get("k"), Some("v"));

        tokio::time::advance(MINUTE + Duration::from_millis(1)).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k"), None);
        assert_eq!(store.len(), 0);
        assert_eq!(store.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_outlives_any_horizon() {
        let store = MemoryStore::new();
        store.insert("k", "v", Duration::ZERO);

        tokio::time::advance(Duration::from_secs(60 * 60 * 24 * 365)).await;

        assert_eq!(store.get("k"), Some("v"));
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_set_after_expiry_is_visible() {
        let store = MemoryStore::new();
        store.insert("k", 1, MINUTE);
        tokio::time::advance(MINUTE * 2).await;
        store.insert("k", 2, MINUTE);
        assert_eq!(store.get("k"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_expired_counts_only_expired() {
        let store = MemoryStore::new();
        store.insert("short", 1, MINUTE);
        store.insert("long", 2, MINUTE * 10);
        store.insert("forever", 3, Duration::ZERO);

        tokio::time::advance(MINUTE * 2).await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("long"), Some(2));
    }

    #[test]
    fn retain_filters_by_value() {
        let store = MemoryStore::new();
        for i in 0..6 {
            store.insert(format!("k{i}"), i, Duration::ZERO);
        }
        assert_eq!(store.retain(|_, v| v % 2 == 0), 3);
        assert_eq!(store.get("k1"), None);
        assert_eq!(store.get("k2"), Some(2));
    }

    #[test]
    fn delete_and_clear_through_the_trait() {
        let store: Arc<dyn Store<u32>> = Arc::new(MemoryStore::new());
        store.set("a", 1, MINUTE).unwrap();
        store.set("b", 2, MINUTE).unwrap();

        store.delete("a").unwrap();
        store.delete("a").unwrap();
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), Some(2));

        store.clear().unwrap();
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn concurrent_writers_leave_one_consistent_value() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        store.insert("shared", i, MINUTE);
                        assert!(store.get("shared").is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!((0..8).contains(&store.get("shared").unwrap()));
        assert_eq!(store.len(), 1);
    }

    fn key_strategy() -> impl Strategy<Value = String> {
        "[a-z0-9/?=&]{1,32}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn set_get_returns_value(key in key_strategy(), value in any::<u64>(), ttl in 1u64..3600) {
            let store = MemoryStore::new();
            store.insert(key.clone(), value, Duration::from_secs(ttl));
            prop_assert_eq!(store.get(&key), Some(value));
        }

        #[test]
        fn delete_always_misses(key in key_strategy(), ttl in 0u64..3600) {
            let store = MemoryStore::new();
            store.insert(key.clone(), 7u8, Duration::from_secs(ttl));
            store.remove(&key);
            prop_assert_eq!(store.get(&key), None);
        }

        #[test]
        fn clear_empties_every_key(keys in prop::collection::hash_set(key_strategy(), 1..20)) {
            let store = MemoryStore::new();
            for key in &keys {
                store.insert(key.clone(), (), Duration::ZERO);
            }
            store.clear();
            for key in &keys {
                prop_assert_eq!(store.get(key), None);
            }
            prop_assert!(store.is_empty());
        }
    }
}
