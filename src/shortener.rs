use serde::Deserialize;

use crate::allocator::IdentifierAllocator;
use crate::config::Config;
use crate::error::{Result, ShortenerError};
use crate::quota::QuotaLimiter;
use crate::response::ShortenResponse;
use crate::store::SharedStore;
use crate::validation::{Expiry, RequestValidator};

/// Body of `POST /api/v1/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
    /// Custom short identifier; empty means "generate one".
    #[serde(default)]
    pub short: Option<String>,
    /// Hours until expiry: 0 for the default, -1 for never.
    #[serde(default)]
    pub expiry: i64,
}

/// Produces short URLs: validates the request, charges the client's quota and
/// stores the mapping.
#[derive(Clone)]
pub struct UrlShortener {
    mappings: SharedStore,
    quota: QuotaLimiter,
    allocator: IdentifierAllocator,
    domain: String,
    default_expiry_hours: u32,
}

impl UrlShortener {
    pub fn new(
        mappings: SharedStore,
        quota: QuotaLimiter,
        allocator: IdentifierAllocator,
        domain: impl Into<String>,
        default_expiry_hours: u32,
    ) -> Self {
        Self {
            mappings,
            quota,
            allocator,
            domain: domain.into(),
            default_expiry_hours,
        }
    }

    pub fn from_config(mappings: SharedStore, quotas: SharedStore, config: &Config) -> Self {
        Self::new(
            mappings.clone(),
            QuotaLimiter::from_config(quotas, config),
            IdentifierAllocator::from_config(mappings, config),
            config.domain.clone(),
            config.default_expiry_hours,
        )
    }

    pub fn quota_limit(&self) -> i64 {
        self.quota.limit()
    }

    /// Shorten `request` on behalf of `client`.
    ///
    /// The quota is checked before any validation but only charged once the
    /// mapping has been written, so rejected requests cost nothing.
    pub async fn shorten(&self, client: &str, request: ShortenRequest) -> Result<ShortenResponse> {
        self.quota.check(client).await?;

        let url = request.url.trim();
        RequestValidator::validate_url(url)?;

        if RequestValidator::is_self_referential(url, &self.domain) {
            tracing::info!(client = %client, url = %url, "Rejected self-referential URL");
            return Err(ShortenerError::SelfReferentialUrl);
        }

        let url = RequestValidator::enforce_http(url);

        let custom = request.short.filter(|short| !short.is_empty());
        let id = match custom {
            Some(custom) => {
                RequestValidator::validate_custom_id(&custom)?;
                // Not atomic with the SET below: a concurrent request for the
                // same short can still win between the two calls.
                if self.mappings.exists(&custom).await? {
                    return Err(ShortenerError::IdentifierInUse(custom));
                }
                custom
            }
            None => self.allocator.allocate().await?,
        };

        let expiry = Expiry::from_request(request.expiry, self.default_expiry_hours)?;

        self.mappings.set(&id, &url, expiry.ttl()).await?;
        tracing::info!(
            client = %client,
            id = %id,
            url = %url,
            expiry_hours = expiry.as_hours(),
            "Stored short URL"
        );

        let status = self.quota.consume(client).await?;

        Ok(ShortenResponse {
            url,
            short: format!("{}/{}", self.domain, id),
            expiry: expiry.as_hours(),
            rate_limit: status.remaining,
            rate_limit_reset: status.reset_minutes(),
        })
    }
}
