//! Key-value store abstraction
//!
//! Every piece of shared state (URL mappings, client quotas, the redirect
//! counter) lives behind [`KeyValueStore`]. The service keeps nothing in
//! process memory between requests; the store is the only point of
//! coordination between concurrent requests.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("operation timed out")]
    Timeout,
    #[error("stored value is invalid: {0}")]
    InvalidData(String),
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist.
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key expires after the given duration.
    Expires(Duration),
}

impl KeyTtl {
    /// Interpret a Redis `TTL` reply (-2 missing, -1 no expiry).
    pub fn from_seconds(seconds: i64) -> Self {
        match seconds {
            -2 => KeyTtl::Missing,
            s if s < 0 => KeyTtl::Persistent,
            s => KeyTtl::Expires(Duration::from_secs(s as u64)),
        }
    }

    pub fn remaining(&self) -> Duration {
        match self {
            KeyTtl::Expires(ttl) => *ttl,
            _ => Duration::ZERO,
        }
    }
}

/// Operations the service needs from one logical store namespace.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Fetch a value, `None` when the key is absent.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value. `None` stores the key without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Atomically increment an integer value, creating it at 0 first if absent.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Atomically decrement an integer value, creating it at 0 first if absent.
    /// The key's TTL is left untouched.
    async fn decr(&self, key: &str) -> StoreResult<i64>;

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl>;

    /// Set a TTL on an existing key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Store handles for the three logical namespaces.
#[derive(Clone)]
pub struct Namespaces {
    /// Short identifier to long URL.
    pub mappings: SharedStore,
    /// Client identifier to remaining quota.
    pub quotas: SharedStore,
    /// Global redirect counter.
    pub counters: SharedStore,
}

impl Namespaces {
    /// Connect one Redis store per configured database index. Namespaces that
    /// share an index share a connection.
    pub async fn connect(config: &Config) -> StoreResult<Self> {
        let timeout = config.store_timeout();
        let connect = |db: i64| {
            RedisStore::connect(&config.db_addr, config.db_pass.as_deref(), db, timeout)
        };

        let mappings: SharedStore = Arc::new(connect(config.mapping_db).await?);

        let quotas: SharedStore = if config.quota_db == config.mapping_db {
            mappings.clone()
        } else {
            Arc::new(connect(config.quota_db).await?)
        };

        let counters: SharedStore = if config.counter_db == config.quota_db {
            quotas.clone()
        } else if config.counter_db == config.mapping_db {
            mappings.clone()
        } else {
            Arc::new(connect(config.counter_db).await?)
        };

        Ok(Self {
            mappings,
            quotas,
            counters,
        })
    }

    /// In-process namespaces. The counter shares the quota namespace, as it
    /// does with the default Redis layout.
    pub fn in_memory() -> Self {
        let quotas: SharedStore = Arc::new(MemoryStore::new());
        Self {
            mappings: Arc::new(MemoryStore::new()),
            counters: quotas.clone(),
            quotas,
        }
    }

    /// Ping each namespace, returning `(name, result)` pairs.
    pub async fn ping_all(&self) -> Vec<(&'static str, StoreResult<()>)> {
        vec![
            ("mappings", self.mappings.ping().await),
            ("quotas", self.quotas.ping().await),
            ("counters", self.counters.ping().await),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_reply_interpretation() {
        assert_eq!(KeyTtl::from_seconds(-2), KeyTtl::Missing);
        assert_eq!(KeyTtl::from_seconds(-1), KeyTtl::Persistent);
        assert_eq!(
            KeyTtl::from_seconds(90),
            KeyTtl::Expires(Duration::from_secs(90))
        );
        assert_eq!(KeyTtl::Persistent.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_in_memory_counter_shares_quota_namespace() {
        let namespaces = Namespaces::in_memory();
        namespaces.counters.incr("counter").await.unwrap();

        assert_eq!(
            namespaces.quotas.get("counter").await.unwrap().as_deref(),
            Some("1")
        );
        assert!(!namespaces.mappings.exists("counter").await.unwrap());
    }
}
