use crate::config::Config;
use crate::error::ShortenerError;
use crate::store::RedisStore;

/// Cross-field checks that the derive-level validation cannot express
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> Result<(), ShortenerError> {
        Self::validate_domain(&config.domain)?;
        Self::validate_quota_window(config)?;
        Self::validate_db_index("MAPPING_DB", config.mapping_db)?;
        Self::validate_db_index("QUOTA_DB", config.quota_db)?;
        Self::validate_db_index("COUNTER_DB", config.counter_db)?;
        config.bind_addr()?;

        if !config.in_memory {
            Self::validate_store_address(&config.db_addr)?;
        }

        Ok(())
    }

    /// Validates the Redis address by building (not connecting) a client
    pub fn validate_store_address(addr: &str) -> Result<(), ShortenerError> {
        if addr.trim().is_empty() {
            return Err(ShortenerError::Configuration(
                "Store address cannot be empty".to_string(),
            ));
        }

        RedisStore::client(addr, None, 0)
            .map(|_| ())
            .map_err(|e| ShortenerError::Configuration(e.to_string()))
    }

    /// The domain is a bare authority: no scheme, no path
    pub fn validate_domain(domain: &str) -> Result<(), ShortenerError> {
        if domain.trim().is_empty() {
            return Err(ShortenerError::Configuration(
                "Domain cannot be empty".to_string(),
            ));
        }

        if domain.contains("://") || domain.contains('/') {
            return Err(ShortenerError::Configuration(format!(
                "Domain '{}' must not contain a scheme or path",
                domain
            )));
        }

        Ok(())
    }

    fn validate_quota_window(config: &Config) -> Result<(), ShortenerError> {
        if config.quota_window.as_secs() == 0 {
            return Err(ShortenerError::Configuration(
                "Quota window must be at least one second".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_db_index(name: &str, index: i64) -> Result<(), ShortenerError> {
        if index < 0 {
            return Err(ShortenerError::Configuration(format!(
                "{} must not be negative",
                name
            )));
        }

        Ok(())
    }
}
