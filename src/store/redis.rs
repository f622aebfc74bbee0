use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, FromRedisValue, IntoConnectionInfo};
use std::time::Duration;

use super::{KeyTtl, KeyValueStore, StoreError, StoreResult};

/// One Redis logical database, used as one store namespace.
///
/// The connection manager is multiplexed and reconnects on its own. Each
/// command clones the handle into a local that is dropped when the command
/// returns, whichever way it returns.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    db: i64,
    timeout: Duration,
}

impl RedisStore {
    /// Connect to database `db` at `addr` (`host:port` or a `redis://` URL).
    pub async fn connect(
        addr: &str,
        password: Option<&str>,
        db: i64,
        timeout: Duration,
    ) -> StoreResult<Self> {
        let client = Self::client(addr, password, db)?;

        let connection = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout)?
            .map_err(|e| StoreError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        tracing::info!(addr = %addr, db, "Connected to Redis");

        Ok(Self {
            connection,
            db,
            timeout,
        })
    }

    /// Build a client for the given address without connecting.
    pub fn client(addr: &str, password: Option<&str>, db: i64) -> StoreResult<Client> {
        // The client is built without a TLS connector.
        if addr.starts_with("rediss://") {
            return Err(StoreError::Connection(format!(
                "TLS Redis addresses are not supported: '{}'",
                addr
            )));
        }

        let url = if addr.starts_with("redis://") {
            addr.to_string()
        } else {
            format!("redis://{}", addr)
        };

        let mut info = url
            .as_str()
            .into_connection_info()
            .map_err(|e| StoreError::Connection(format!("Invalid Redis address '{}': {}", addr, e)))?;
        info.redis.db = db;
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            info.redis.password = Some(password.to_string());
        }

        Client::open(info)
            .map_err(|e| StoreError::Connection(format!("Failed to create Redis client: {}", e)))
    }

    async fn query<T>(&self, name: &str, cmd: &redis::Cmd) -> StoreResult<T>
    where
        T: FromRedisValue + Send,
    {
        let mut connection = self.connection.clone();

        match tokio::time::timeout(self.timeout, cmd.query_async::<_, T>(&mut connection)).await {
            Ok(result) => {
                result.map_err(|e| StoreError::Command(format!("{} failed: {}", name, e)))
            }
            Err(_) => {
                tracing::warn!(command = name, db = self.db, "Redis command timed out");
                Err(StoreError::Timeout)
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.query("GET", redis::cmd("GET").arg(key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);

        // A zero TTL means the key never expires.
        if let Some(ttl) = ttl.filter(|ttl| !ttl.is_zero()) {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }

        self.query::<()>("SET", &cmd).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let count: i64 = self.query("EXISTS", redis::cmd("EXISTS").arg(key)).await?;
        Ok(count > 0)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.query("INCR", redis::cmd("INCR").arg(key)).await
    }

    async fn decr(&self, key: &str) -> StoreResult<i64> {
        self.query("DECR", redis::cmd("DECR").arg(key)).await
    }

    async fn ttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let seconds: i64 = self.query("TTL", redis::cmd("TTL").arg(key)).await?;
        Ok(KeyTtl::from_seconds(seconds))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let updated: i64 = self
            .query(
                "EXPIRE",
                redis::cmd("EXPIRE").arg(key).arg(ttl.as_secs().max(1)),
            )
            .await?;
        Ok(updated == 1)
    }

    async fn ping(&self) -> StoreResult<()> {
        let reply: String = self.query("PING", &redis::cmd("PING")).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(StoreError::InvalidData(format!("unexpected PING reply '{}'", reply)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_from_host_port() {
        let client = RedisStore::client("127.0.0.1:6379", Some("secret"), 1).unwrap();
        let info = client.get_connection_info();
        assert_eq!(info.redis.db, 1);
        assert_eq!(info.redis.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_db_index_overrides_url_path() {
        let client = RedisStore::client("redis://localhost:6380/5", None, 0).unwrap();
        let info = client.get_connection_info();
        assert_eq!(info.redis.db, 0);
        assert!(info.redis.password.is_none());
    }

    #[test]
    fn test_empty_password_is_ignored() {
        let client = RedisStore::client("localhost:6379", Some(""), 0).unwrap();
        assert!(client.get_connection_info().redis.password.is_none());
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(
            RedisStore::client("redis://localhost:notaport", None, 0),
            Err(StoreError::Connection(_))
        ));
    }

    #[test]
    fn test_tls_address_is_refused() {
        assert!(matches!(
            RedisStore::client("rediss://cache.internal:6380", None, 0),
            Err(StoreError::Connection(_))
        ));
    }
}
