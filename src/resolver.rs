use crate::error::{Result, ShortenerError};
use crate::store::SharedStore;

/// Key of the global redirect counter in the counter namespace.
pub const REDIRECT_COUNTER_KEY: &str = "counter";

/// Turns a short identifier back into its long URL.
#[derive(Clone)]
pub struct UrlResolver {
    mappings: SharedStore,
    counters: SharedStore,
}

impl UrlResolver {
    pub fn new(mappings: SharedStore, counters: SharedStore) -> Self {
        Self { mappings, counters }
    }

    /// Look up `id` and record the redirect.
    ///
    /// Counting is best effort: a failed increment is logged and the long URL
    /// is still returned.
    pub async fn resolve(&self, id: &str) -> Result<String> {
        let url = self
            .mappings
            .get(id)
            .await?
            .ok_or_else(|| ShortenerError::NotFound(id.to_string()))?;

        match self.counters.incr(REDIRECT_COUNTER_KEY).await {
            Ok(total) => tracing::debug!(id = %id, total, "Recorded redirect"),
            Err(e) => tracing::warn!(id = %id, error = %e, "Failed to record redirect"),
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_resolve_counts_redirects() {
        let mappings = Arc::new(MemoryStore::new());
        let counters = Arc::new(MemoryStore::new());
        mappings
            .set("abc123", "http://example.com/page", None)
            .await
            .unwrap();

        let resolver = UrlResolver::new(mappings, counters.clone());
        assert_eq!(
            resolver.resolve("abc123").await.unwrap(),
            "http://example.com/page"
        );
        resolver.resolve("abc123").await.unwrap();

        assert_eq!(
            counters.get(REDIRECT_COUNTER_KEY).await.unwrap().as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_unknown_identifier() {
        let counters = Arc::new(MemoryStore::new());
        let resolver = UrlResolver::new(Arc::new(MemoryStore::new()), counters.clone());

        assert!(matches!(
            resolver.resolve("nope").await,
            Err(ShortenerError::NotFound(id)) if id == "nope"
        ));
        assert!(counters.get(REDIRECT_COUNTER_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_counter_failure_does_not_fail_resolution() {
        let mappings = Arc::new(MemoryStore::new());
        let counters = Arc::new(MemoryStore::new());
        mappings.set("abc123", "http://example.com", None).await.unwrap();
        // A non-integer counter makes INCR fail.
        counters
            .set(REDIRECT_COUNTER_KEY, "broken", None)
            .await
            .unwrap();

        let resolver = UrlResolver::new(mappings, counters);
        assert_eq!(resolver.resolve("abc123").await.unwrap(), "http://example.com");
    }
}
