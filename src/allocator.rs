use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, ShortenerError};
use crate::store::SharedStore;

type Generator = Arc<dyn Fn() -> String + Send + Sync>;

/// Produces short identifiers that are not yet present in the mapping namespace.
///
/// The existence check and the later write are separate store calls, so two
/// writers can still race for the same identifier between them.
#[derive(Clone)]
pub struct IdentifierAllocator {
    mappings: SharedStore,
    max_attempts: u32,
    generate: Generator,
}

impl IdentifierAllocator {
    pub fn new(mappings: SharedStore, length: usize, max_attempts: u32) -> Self {
        Self::with_generator(mappings, max_attempts, move || random_identifier(length))
    }

    pub fn from_config(mappings: SharedStore, config: &Config) -> Self {
        Self::new(mappings, config.id_length, config.max_allocation_attempts)
    }

    /// Use a custom token source instead of random UUID prefixes.
    pub fn with_generator<F>(mappings: SharedStore, max_attempts: u32, generate: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            mappings,
            max_attempts: max_attempts.max(1),
            generate: Arc::new(generate),
        }
    }

    /// Generate candidates until one is free, giving up after `max_attempts`.
    pub async fn allocate(&self) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            let candidate = (self.generate)();

            if !self.mappings.exists(&candidate).await? {
                tracing::debug!(id = %candidate, attempt, "Allocated short identifier");
                return Ok(candidate);
            }

            tracing::debug!(id = %candidate, attempt, "Short identifier collision");
        }

        tracing::warn!(attempts = self.max_attempts, "Short identifier allocation exhausted");
        Err(ShortenerError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl fmt::Debug for IdentifierAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierAllocator")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Leading hex characters of a random v4 UUID (at most 32).
pub fn random_identifier(length: usize) -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(length);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_random_identifier_shape() {
        let id = random_identifier(6);
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(random_identifier(64).len(), 32);
    }

    #[tokio::test]
    async fn test_allocates_free_identifier() {
        let store = Arc::new(MemoryStore::new());
        let allocator = IdentifierAllocator::new(store.clone(), 6, 100);

        let id = allocator.allocate().await.unwrap();
        assert_eq!(id.len(), 6);
        assert!(!store.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_retries_on_collision() {
        let store = Arc::new(MemoryStore::new());
        store.set("taken1", "http://a.com", None).await.unwrap();
        store.set("taken2", "http://b.com", None).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let allocator = IdentifierAllocator::with_generator(store, 100, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            format!("taken{}", n)
        });

        assert_eq!(allocator.allocate().await.unwrap(), "taken3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion() {
        let store = Arc::new(MemoryStore::new());
        store.set("always", "http://a.com", None).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let allocator = IdentifierAllocator::with_generator(store, 100, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "always".to_string()
        });

        let err = allocator.allocate().await.unwrap_err();
        assert!(matches!(
            err,
            ShortenerError::AllocationExhausted { attempts: 100 }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 100);
    }
}
