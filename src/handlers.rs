use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::config::Config;
use crate::counter::UsageCounter;
use crate::error::{Result, ShortenerError};
use crate::middleware::ClientIp;
use crate::resolver::UrlResolver;
use crate::response::{CountResponse, HealthResponse, StoreStatus};
use crate::shortener::{ShortenRequest, UrlShortener};
use crate::store::Namespaces;

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Application state: the service components and their stores. Nothing here
/// is mutated after startup.
pub struct AppState {
    pub config: Config,
    pub namespaces: Namespaces,
    pub shortener: UrlShortener,
    pub resolver: UrlResolver,
    pub counter: UsageCounter,
}

impl AppState {
    pub fn new(config: Config, namespaces: Namespaces) -> Self {
        let shortener = UrlShortener::from_config(
            namespaces.mappings.clone(),
            namespaces.quotas.clone(),
            &config,
        );
        let resolver = UrlResolver::new(namespaces.mappings.clone(), namespaces.counters.clone());
        let counter = UsageCounter::new(namespaces.counters.clone());

        Self {
            config,
            namespaces,
            shortener,
            resolver,
            counter,
        }
    }
}

/// Shorten a URL
pub async fn shorten_url(
    State(state): State<SharedState>,
    ClientIp(client): ClientIp,
    payload: std::result::Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Rejected shorten body");
        ShortenerError::BadRequest("cannot parse JSON".to_string())
    })?;

    let response = state.shortener.shorten(&client, request).await?;

    let limit = state.shortener.quota_limit().to_string();
    let remaining = response.rate_limit.to_string();
    let reset = response.rate_limit_reset.to_string();

    let mut resp = Json(response).into_response();

    // Add rate limit headers
    let headers = resp.headers_mut();
    for (name, value) in [
        ("x-ratelimit-limit", limit),
        ("x-ratelimit-remaining", remaining),
        ("x-ratelimit-reset", reset),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }

    Ok(resp)
}

/// Redirect a short identifier to its long URL
pub async fn resolve_url(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let url = state.resolver.resolve(&id).await?;

    let location = HeaderValue::from_str(&url).map_err(|_| {
        ShortenerError::StoreUnavailable(format!("mapping for '{}' is not a valid location", id))
    })?;

    Ok((StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response())
}

/// Total number of redirects served
pub async fn url_count(State(state): State<SharedState>) -> impl IntoResponse {
    match state.counter.count().await {
        Ok(count) => (StatusCode::OK, Json(CountResponse::fetched(count))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read redirect counter");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(CountResponse::failed()))
        }
    }
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let stores = state
        .namespaces
        .ping_all()
        .await
        .into_iter()
        .map(|(namespace, result)| StoreStatus {
            namespace: namespace.to_string(),
            connected: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        })
        .collect();

    let health = HealthResponse::from_stores(stores);
    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(health))
}
