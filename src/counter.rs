use crate::error::Result;
use crate::resolver::REDIRECT_COUNTER_KEY;
use crate::store::{SharedStore, StoreError};

/// Reports the global redirect count.
#[derive(Clone)]
pub struct UsageCounter {
    counters: SharedStore,
}

impl UsageCounter {
    pub fn new(counters: SharedStore) -> Self {
        Self { counters }
    }

    /// Total redirects so far. A counter that was never incremented reads as 0.
    pub async fn count(&self) -> Result<u64> {
        match self.counters.get(REDIRECT_COUNTER_KEY).await? {
            None => Ok(0),
            Some(value) => value.trim().parse::<u64>().map_err(|_| {
                StoreError::InvalidData(format!("redirect counter holds '{}'", value)).into()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShortenerError;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_uninitialized_counter_is_zero() {
        let counter = UsageCounter::new(Arc::new(MemoryStore::new()));
        assert_eq!(counter.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reads_current_count() {
        let store = Arc::new(MemoryStore::new());
        store.incr(REDIRECT_COUNTER_KEY).await.unwrap();
        store.incr(REDIRECT_COUNTER_KEY).await.unwrap();

        let counter = UsageCounter::new(store);
        assert_eq!(counter.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_counter() {
        let store = Arc::new(MemoryStore::new());
        store.set(REDIRECT_COUNTER_KEY, "many", None).await.unwrap();

        let counter = UsageCounter::new(store);
        assert!(matches!(
            counter.count().await,
            Err(ShortenerError::StoreUnavailable(_))
        ));
    }
}
