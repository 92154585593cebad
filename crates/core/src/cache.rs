use std::{
    collections::HashMap,
    marker::PhantomData,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::{error::Result, store::DocumentStore};

pub const SUMMARY_FRESHNESS: Duration = Duration::days(30);
pub const QUIZ_FRESHNESS: Duration = Duration::days(30);
pub const METADATA_FRESHNESS: Duration = Duration::days(7);
pub const SEARCH_FRESHNESS: Duration = Duration::hours(1);

/// A cache entry knows when it was produced.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Exclusive boundary: an entry exactly `window` old is stale.
pub fn is_fresh(timestamp: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now - timestamp < window
}

/// Typed view over one collection of a [`DocumentStore`] with a freshness window.
///
/// A read only hits when the entry exists and is fresh. Stale entries are left in place and get
/// overwritten by the next [`Cache::put`].
pub struct Cache<T> {
    store: Arc<dyn DocumentStore>,
    collection: &'static str,
    window: Duration,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection,
            window: self.window,
            _marker: PhantomData,
        }
    }
}

impl<T> Cache<T>
where
    T: Serialize + DeserializeOwned + Timestamped,
{
    pub fn new(store: Arc<dyn DocumentStore>, collection: &'static str, window: Duration) -> Self {
        Self {
            store,
            collection,
            window,
            _marker: PhantomData,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub async fn get(&self, key: &str) -> Result<Option<T>> {
        self.get_at(key, Utc::now()).await
    }

    pub async fn get_at(&self, key: &str, now: DateTime<Utc>) -> Result<Option<T>> {
        let Some(doc) = self.store.find(self.collection, key).await? else {
            return Ok(None);
        };

        let value: T = match serde_json::from_value(doc) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    collection = self.collection,
                    key,
                    error = %e,
                    "Unreadable cache entry, treating as miss"
                );
                return Ok(None);
            }
        };

        if is_fresh(value.timestamp(), now, self.window) {
            Ok(Some(value))
        } else {
            tracing::debug!(collection = self.collection, key, "Stale cache entry");
            Ok(None)
        }
    }

    pub async fn put(&self, key: &str, value: &T) -> Result<()> {
        let doc = serde_json::to_value(value)?;
        self.store.upsert(self.collection, key, doc).await
    }
}

/// Per-key async mutexes so concurrent misses for one key generate once.
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Forget locks nobody holds any more.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::store::MemoryStore;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Entry {
        value: u32,
        at: DateTime<Utc>,
    }

    impl Timestamped for Entry {
        fn timestamp(&self) -> DateTime<Utc> {
            self.at
        }
    }

    fn cache() -> Cache<Entry> {
        Cache::new(Arc::new(MemoryStore::new()), "entries", Duration::days(30))
    }

    #[test]
    fn freshness_boundary_is_exclusive() {
        let now = Utc::now();
        let window = Duration::days(30);
        assert!(!is_fresh(now - window, now, window));
        assert!(is_fresh(now - window + Duration::seconds(1), now, window));
        assert!(!is_fresh(now - window - Duration::seconds(1), now, window));
    }

    #[tokio::test]
    async fn entry_at_exact_window_is_a_miss() {
        let cache = cache();
        let now = Utc::now();
        let entry = Entry {
            value: 1,
            at: now - Duration::days(30),
        };
        cache.put("k", &entry).await.unwrap();

        assert!(cache.get_at("k", now).await.unwrap().is_none());
        assert_eq!(
            cache
                .get_at("k", now - Duration::seconds(1))
                .await
                .unwrap(),
            Some(entry)
        );
    }

    #[tokio::test]
    async fn put_overwrites_stale_entry() {
        let cache = cache();
        let now = Utc::now();
        cache
            .put(
                "k",
                &Entry {
                    value: 1,
                    at: now - Duration::days(90),
                },
            )
            .await
            .unwrap();
        assert!(cache.get_at("k", now).await.unwrap().is_none());

        cache.put("k", &Entry { value: 2, at: now }).await.unwrap();
        assert_eq!(cache.get_at("k", now).await.unwrap().unwrap().value, 2);
    }

    #[tokio::test]
    async fn unreadable_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert("entries", "k", serde_json::json!({"unexpected": true}))
            .await
            .unwrap();
        let cache: Cache<Entry> = Cache::new(store, "entries", Duration::days(1));
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keyed_locks_serialize_same_key() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.lock("a").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("a").await;
            })
        };
        // A different key is never blocked.
        let _other = locks.lock("b").await;

        tokio::task::yield_now().await;
        assert!(!contender.is_finished());
        drop(guard);
        contender.await.unwrap();
    }
}
