use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::{KeyTtl, KeyValueStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process store with Redis-like TTL semantics, for development and tests.
///
/// Expiry follows the tokio clock, so tests can drive TTLs with a paused
/// runtime.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Command("Failed to acquire store lock".to_string()))
    }

    /// Return the live entry for `key`, evicting it first if it has expired.
    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    fn add(&self, key: &str, delta: i64) -> StoreResult<i64> {
        let mut entries = self.lock()?;

        let current = match Self::live(&mut entries, key) {
            Some(entry) => entry.value.parse::<i64>().map_err(|_| {
                StoreError::InvalidData(format!("value at '{}' is not an integer", key))
            })?,
            None => 0,
        };
        let updated = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::InvalidData(format!("value at '{}' overflowed", key)))?;

        match Self::live(&mut entries, key) {
            Some(entry) => entry.value = updated.to_string(),
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: updated.to_string(),
                        expires_at: None,
                    },
                );
            }
        }

        Ok(updated)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.lock()?;
        Ok(Self::live(&mut entries, key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let expires_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| Instant::now().checked_add(ttl));

        self.lock()?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.lock()?;
        Ok(Self::live(&mut entries, key).is_some())
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.add(key, 1)
    }

    async fn decr(&self, key: &str) -> StoreResult<i64> {
        self.add(key, -1)
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let mut entries = self.lock()?;
        let now = Instant::now();

        Ok(match Self::live(&mut entries, key) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            // Whole seconds, like Redis.
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(Duration::from_secs(at.saturating_duration_since(now).as_secs())),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut entries = self.lock()?;

        match Self::live(&mut entries, key) {
            Some(entry) => {
                entry.expires_at = Instant::now().checked_add(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        store.set("abc123", "http://example.com", None).await.unwrap();

        assert_eq!(
            store.get("abc123").await.unwrap().as_deref(),
            Some("http://example.com")
        );
        assert!(store.exists("abc123").await.unwrap());
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_expire() {
        let store = MemoryStore::new();
        store
            .set("short", "http://example.com", Some(Duration::from_secs(60)))
            .await
            .unwrap();

        assert_eq!(
            store.ttl("short").await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(60))
        );

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(store.get("short").await.unwrap().is_none());
        assert_eq!(store.ttl("short").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let store = MemoryStore::new();
        store
            .set("forever", "http://example.com", Some(Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(store.ttl("forever").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decr_keeps_ttl() {
        let store = MemoryStore::new();
        store
            .set("10.0.0.1", "5", Some(Duration::from_secs(1800)))
            .await
            .unwrap();

        assert_eq!(store.decr("10.0.0.1").await.unwrap(), 4);
        assert_eq!(
            store.ttl("10.0.0.1").await.unwrap(),
            KeyTtl::Expires(Duration::from_secs(1800))
        );
    }

    #[tokio::test]
    async fn test_counters_start_at_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("counter").await.unwrap(), 1);
        assert_eq!(store.incr("counter").await.unwrap(), 2);
        assert_eq!(store.decr("fresh").await.unwrap(), -1);
        assert_eq!(store.ttl("fresh").await.unwrap(), KeyTtl::Persistent);
    }

    #[tokio::test]
    async fn test_incr_rejects_non_integer() {
        let store = MemoryStore::new();
        store.set("abc123", "http://example.com", None).await.unwrap();

        assert!(matches!(
            store.incr("abc123").await,
            Err(StoreError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn test_expire_missing_key() {
        let store = MemoryStore::new();
        assert!(!store.expire("nope", Duration::from_secs(5)).await.unwrap());
    }
}
