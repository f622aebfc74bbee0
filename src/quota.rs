use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, ShortenerError};
use crate::store::{KeyTtl, SharedStore, StoreError};

/// Quota records share a database with the redirect counter, so client keys
/// carry their own prefix.
pub const QUOTA_KEY_PREFIX: &str = "quota:";

/// Store key holding `client`'s remaining budget.
pub fn quota_key(client: &str) -> String {
    format!("{}{}", QUOTA_KEY_PREFIX, client)
}

/// Remaining budget of one client after a consumed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub remaining: i64,
    pub reset_in: Duration,
}

impl QuotaStatus {
    /// Whole minutes until the window resets.
    pub fn reset_minutes(&self) -> u64 {
        self.reset_in.as_secs() / 60
    }
}

/// Per-client request budget kept in the quota namespace.
///
/// A client's key holds its remaining count and carries the window as its
/// TTL. The key is (re)created at the full quota only when absent, so the
/// window starts with the client's first request and ends when the key
/// expires. Checking and consuming are separate calls: a request is charged
/// only once the guarded work has succeeded, and concurrent requests from the
/// same client may all pass the check before any of them is charged.
#[derive(Clone)]
pub struct QuotaLimiter {
    quotas: SharedStore,
    limit: i64,
    window: Duration,
}

impl QuotaLimiter {
    pub fn new(quotas: SharedStore, limit: i64, window: Duration) -> Self {
        Self {
            quotas,
            limit,
            window,
        }
    }

    pub fn from_config(quotas: SharedStore, config: &Config) -> Self {
        Self::new(quotas, config.api_quota, config.quota_window)
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Admit or reject a request without charging it.
    pub async fn check(&self, client: &str) -> Result<()> {
        let key = quota_key(client);
        let Some(value) = self.quotas.get(&key).await? else {
            tracing::debug!(client = %client, limit = self.limit, "Opening quota window");
            self.quotas
                .set(&key, &self.limit.to_string(), Some(self.window))
                .await?;
            return Ok(());
        };

        let remaining = parse_count(client, &value)?;
        if remaining > 0 {
            return Ok(());
        }

        let reset_in = self.quotas.ttl(&key).await?.remaining();
        tracing::info!(
            client = %client,
            reset_secs = reset_in.as_secs(),
            "Quota exhausted"
        );

        Err(ShortenerError::QuotaExceeded {
            reset_minutes: reset_in.as_secs() / 60,
        })
    }

    /// Charge one request and report what is left.
    pub async fn consume(&self, client: &str) -> Result<QuotaStatus> {
        let key = quota_key(client);
        let remaining = self.quotas.decr(&key).await?;

        match self.quotas.ttl(&key).await? {
            KeyTtl::Expires(reset_in) => Ok(QuotaStatus {
                remaining,
                reset_in,
            }),
            // The window lapsed between check and consume and DECR recreated
            // the key without a TTL. Charge the request to a fresh window.
            KeyTtl::Persistent | KeyTtl::Missing => {
                tracing::debug!(client = %client, "Quota window lapsed, opening a new one");
                let remaining = self.limit - 1;
                self.quotas
                    .set(&key, &remaining.to_string(), Some(self.window))
                    .await?;
                Ok(QuotaStatus {
                    remaining,
                    reset_in: self.window,
                })
            }
        }
    }
}

fn parse_count(client: &str, value: &str) -> Result<i64> {
    value.trim().parse::<i64>().map_err(|_| {
        StoreError::InvalidData(format!("quota for '{}' is not an integer", client)).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(30 * 60);

    fn limiter(limit: i64) -> (QuotaLimiter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (QuotaLimiter::new(store.clone(), limit, WINDOW), store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_request_opens_window() {
        let (limiter, store) = limiter(30);

        tokio_test::assert_ok!(limiter.check("10.0.0.1").await);

        assert_eq!(store.get(&quota_key("10.0.0.1")).await.unwrap().as_deref(), Some("30"));
        assert_eq!(store.ttl(&quota_key("10.0.0.1")).await.unwrap(), KeyTtl::Expires(WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_decrements_without_extending_window() {
        let (limiter, _store) = limiter(30);
        limiter.check("10.0.0.1").await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;

        let status = limiter.consume("10.0.0.1").await.unwrap();
        assert_eq!(status.remaining, 29);
        assert_eq!(status.reset_in, WINDOW - Duration::from_secs(60));
        assert_eq!(status.reset_minutes(), 29);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_until_window_expires() {
        let (limiter, _store) = limiter(3);

        for _ in 0..3 {
            limiter.check("10.0.0.1").await.unwrap();
            limiter.consume("10.0.0.1").await.unwrap();
        }

        let err = limiter.check("10.0.0.1").await.unwrap_err();
        match err {
            ShortenerError::QuotaExceeded { reset_minutes } => assert_eq!(reset_minutes, 30),
            other => panic!("unexpected error: {:?}", other),
        }

        // Other clients are unaffected.
        tokio_test::assert_ok!(limiter.check("10.0.0.2").await);

        tokio::time::advance(WINDOW).await;
        tokio_test::assert_ok!(limiter.check("10.0.0.1").await);
        assert_eq!(limiter.consume("10.0.0.1").await.unwrap().remaining, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_does_not_charge() {
        let (limiter, store) = limiter(1);

        for _ in 0..5 {
            limiter.check("10.0.0.1").await.unwrap();
        }
        assert_eq!(store.get(&quota_key("10.0.0.1")).await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_restores_lapsed_window() {
        let (limiter, store) = limiter(5);
        limiter.check("10.0.0.1").await.unwrap();

        tokio::time::advance(WINDOW).await;

        let status = limiter.consume("10.0.0.1").await.unwrap();
        assert_eq!(status.remaining, 4);
        assert_eq!(status.reset_in, WINDOW);
        assert_eq!(store.get(&quota_key("10.0.0.1")).await.unwrap().as_deref(), Some("4"));
        assert_eq!(store.ttl(&quota_key("10.0.0.1")).await.unwrap(), KeyTtl::Expires(WINDOW));
    }

    #[tokio::test]
    async fn test_corrupt_count_is_a_store_error() {
        let (limiter, store) = limiter(5);
        store.set(&quota_key("10.0.0.1"), "lots", None).await.unwrap();

        assert!(matches!(
            limiter.check("10.0.0.1").await,
            Err(ShortenerError::StoreUnavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_named_like_a_shared_key() {
        let (limiter, store) = limiter(5);
        store.incr("counter").await.unwrap();

        limiter.check("counter").await.unwrap();
        limiter.consume("counter").await.unwrap();

        assert_eq!(store.get("counter").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.ttl("counter").await.unwrap(), KeyTtl::Persistent);
        assert_eq!(store.get("quota:counter").await.unwrap().as_deref(), Some("4"));
    }
}
