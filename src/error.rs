use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, ShortenerError>;

/// Failures surfaced by the shortening, resolution and counting operations.
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("rate limit exceeded, resets in {reset_minutes} minutes")]
    QuotaExceeded { reset_minutes: u64 },
    #[error("URLs pointing at this service cannot be shortened")]
    SelfReferentialUrl,
    #[error("custom short '{0}' is already in use")]
    IdentifierInUse(String),
    #[error("short '{0}' not found")]
    NotFound(String),
    #[error("no free identifier after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ShortenerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ShortenerError::BadRequest(_) | ShortenerError::InvalidUrl(_) => {
                StatusCode::BAD_REQUEST
            }
            ShortenerError::QuotaExceeded { .. } | ShortenerError::SelfReferentialUrl => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ShortenerError::IdentifierInUse(_) => StatusCode::FORBIDDEN,
            ShortenerError::NotFound(_) => StatusCode::NOT_FOUND,
            ShortenerError::AllocationExhausted { .. }
            | ShortenerError::StoreUnavailable(_)
            | ShortenerError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error tag used in response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ShortenerError::BadRequest(_) => "bad_request",
            ShortenerError::InvalidUrl(_) => "invalid_url",
            ShortenerError::QuotaExceeded { .. } => "rate_limit_exceeded",
            ShortenerError::SelfReferentialUrl => "self_referential_url",
            ShortenerError::IdentifierInUse(_) => "identifier_in_use",
            ShortenerError::NotFound(_) => "not_found",
            ShortenerError::AllocationExhausted { .. } => "allocation_exhausted",
            ShortenerError::StoreUnavailable(_) => "store_unavailable",
            ShortenerError::Configuration(_) => "configuration_error",
        }
    }
}

impl From<StoreError> for ShortenerError {
    fn from(err: StoreError) -> Self {
        ShortenerError::StoreUnavailable(err.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_reset: Option<u64>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, code: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            code,
            rate_limit_reset: None,
        }
    }

    pub fn from_shortener_error(err: &ShortenerError) -> Self {
        // Store details stay in the logs, clients get a generic message.
        let message = match err {
            ShortenerError::StoreUnavailable(_) => "Unable to connect to server".to_string(),
            ShortenerError::AllocationExhausted { .. } => {
                "Unable to allocate a short identifier".to_string()
            }
            other => other.to_string(),
        };

        let mut response = Self::new(err.kind(), &message, err.status_code().as_u16());
        if let ShortenerError::QuotaExceeded { reset_minutes } = err {
            response.rate_limit_reset = Some(*reset_minutes);
        }
        response
    }
}

impl IntoResponse for ShortenerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ShortenerError::AllocationExhausted { .. }
            | ShortenerError::StoreUnavailable(_)
            | ShortenerError::Configuration(_) => {
                tracing::error!(error = %self, "Request failed");
            }
            _ => {
                tracing::debug!(error = %self, status = %status, "Request rejected");
            }
        }

        let mut response =
            (status, Json(ErrorResponse::from_shortener_error(&self))).into_response();

        if let ShortenerError::QuotaExceeded { reset_minutes } = self {
            let retry_after = reset_minutes.saturating_mul(60).max(1);
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}
