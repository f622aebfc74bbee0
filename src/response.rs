use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Successful reply to a shorten request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortenResponse {
    /// Long URL as stored, scheme included
    pub url: String,
    /// `<domain>/<id>`
    pub short: String,
    /// Effective expiry in hours, -1 for never
    pub expiry: i64,
    /// Requests left in the current quota window
    pub rate_limit: i64,
    /// Whole minutes until the quota window resets
    pub rate_limit_reset: u64,
}

/// Reply to `GET /count/`. Values are strings on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountResponse {
    pub status: String,
    pub message: String,
    pub count: String,
}

impl CountResponse {
    pub fn fetched(count: u64) -> Self {
        Self {
            status: "true".to_string(),
            message: "Total redirects fetched".to_string(),
            count: count.to_string(),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: "false".to_string(),
            message: "Internal Server Error".to_string(),
            count: "0".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub stores: Vec<StoreStatus>,
}

#[derive(Debug, Serialize)]
pub struct StoreStatus {
    pub namespace: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    pub fn from_stores(stores: Vec<StoreStatus>) -> Self {
        let status = if stores.iter().all(|store| store.connected) {
            "healthy"
        } else {
            "unhealthy"
        };

        Self {
            status: status.to_string(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            stores,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_response_uses_strings() {
        let json = serde_json::to_value(CountResponse::fetched(0)).unwrap();
        assert_eq!(json["status"], "true");
        assert_eq!(json["count"], "0");
    }

    #[test]
    fn test_health_status() {
        let healthy = HealthResponse::from_stores(vec![StoreStatus {
            namespace: "mappings".to_string(),
            connected: true,
            error: None,
        }]);
        assert!(healthy.is_healthy());

        let unhealthy = HealthResponse::from_stores(vec![StoreStatus {
            namespace: "quotas".to_string(),
            connected: false,
            error: Some("operation timed out".to_string()),
        }]);
        assert!(!unhealthy.is_healthy());

        let json = serde_json::to_string(&unhealthy).unwrap();
        assert!(json.contains("operation timed out"));
    }
}
