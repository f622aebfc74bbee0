//! Input validation for shorten requests.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use validator::ValidateUrl;

use crate::error::ShortenerError;

/// Path segments the router serves itself; a short with one of these names
/// could never be resolved.
pub const RESERVED_IDENTIFIERS: &[&str] = &["api", "count", "health"];

pub const MAX_CUSTOM_ID_LEN: usize = 64;

/// Expiry sentinel meaning "never expire".
pub const NEVER_EXPIRE: i64 = -1;

static CUSTOM_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("custom id pattern is valid"));

static SCHEME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*$").expect("scheme pattern is valid"));

/// Request validation utilities
pub struct RequestValidator;

impl RequestValidator {
    /// Checks that `url` is a well-formed absolute URL once the default scheme
    /// is applied. Explicit schemes other than http(s) are refused.
    pub fn validate_url(url: &str) -> Result<(), ShortenerError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl("URL cannot be empty".to_string()));
        }

        if let Some((scheme, _)) = split_scheme(url) {
            let scheme = scheme.to_ascii_lowercase();
            if scheme != "http" && scheme != "https" {
                return Err(ShortenerError::InvalidUrl(format!(
                    "unsupported scheme '{}'",
                    scheme
                )));
            }
        }

        let candidate = Self::enforce_http(url);
        if !candidate.validate_url() || Self::host(&candidate).is_empty() {
            return Err(ShortenerError::InvalidUrl(format!("'{}' is not a valid URL", url)));
        }

        Ok(())
    }

    /// Prefixes `http://` unless the text already carries a scheme or starts
    /// with `http`. An explicit scheme is lowercased.
    pub fn enforce_http(url: &str) -> String {
        match split_scheme(url) {
            Some((scheme, rest)) => format!("{}://{}", scheme.to_ascii_lowercase(), rest),
            None if url.starts_with("http") => url.to_string(),
            None => format!("http://{}", url),
        }
    }

    /// Extracts the lowercase host (with port) from a URL: scheme, userinfo,
    /// a leading `www.`, path, query and fragment are dropped.
    pub fn host(url: &str) -> String {
        let rest = match split_scheme(url) {
            Some((_, rest)) => rest,
            None => url,
        };

        let authority = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        let authority = authority.rsplit('@').next().unwrap_or_default();
        let authority = authority.to_ascii_lowercase();

        match authority.strip_prefix("www.") {
            Some(stripped) => stripped.to_string(),
            None => authority,
        }
    }

    /// True when `url` points at `domain`. A domain configured without a
    /// port matches its host on any port.
    pub fn is_self_referential(url: &str, domain: &str) -> bool {
        let domain = Self::host(domain.trim());
        if domain.is_empty() {
            return false;
        }

        let host = Self::host(url.trim());
        if host == domain {
            return true;
        }

        !domain.contains(':') && strip_port(&host) == domain
    }

    /// Custom shorts must be URL-safe and must not shadow a route.
    pub fn validate_custom_id(id: &str) -> Result<(), ShortenerError> {
        if id.len() > MAX_CUSTOM_ID_LEN {
            return Err(ShortenerError::BadRequest(format!(
                "Custom short cannot exceed {} characters",
                MAX_CUSTOM_ID_LEN
            )));
        }

        if !CUSTOM_ID_PATTERN.is_match(id) {
            return Err(ShortenerError::BadRequest(
                "Custom short can only contain alphanumeric characters, hyphens, and underscores"
                    .to_string(),
            ));
        }

        if RESERVED_IDENTIFIERS.contains(&id.to_ascii_lowercase().as_str()) {
            return Err(ShortenerError::BadRequest(format!(
                "Custom short '{}' is reserved",
                id
            )));
        }

        Ok(())
    }
}

/// Splits off a leading `scheme://`. A `://` that appears after the path,
/// query or fragment has started is not a scheme separator.
fn split_scheme(url: &str) -> Option<(&str, &str)> {
    url.split_once("://")
        .filter(|(scheme, _)| SCHEME_PATTERN.is_match(scheme))
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals keep their colons.
    if host.starts_with('[') {
        return host.split_inclusive(']').next().unwrap_or(host);
    }
    host.split(':').next().unwrap_or(host)
}

/// Effective lifetime of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Hours(u32),
    Never,
}

impl Expiry {
    /// Interprets the request's `expiry` field: 0 selects the default, -1
    /// never expires, positive values are hours.
    pub fn from_request(hours: i64, default_hours: u32) -> Result<Self, ShortenerError> {
        match hours {
            0 => Ok(Expiry::Hours(default_hours)),
            NEVER_EXPIRE => Ok(Expiry::Never),
            h if h > 0 => u32::try_from(h)
                .map(Expiry::Hours)
                .map_err(|_| ShortenerError::BadRequest(format!("Expiry of {} hours is too large", h))),
            h => Err(ShortenerError::BadRequest(format!(
                "Expiry must be a positive number of hours, 0 or -1, got {}",
                h
            ))),
        }
    }

    /// TTL for the store, `None` for mappings that never expire.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Expiry::Hours(hours) => Some(Duration::from_secs(u64::from(*hours) * 3600)),
            Expiry::Never => None,
        }
    }

    /// Hours as echoed back to the client, -1 for never.
    pub fn as_hours(&self) -> i64 {
        match self {
            Expiry::Hours(hours) => i64::from(*hours),
            Expiry::Never => NEVER_EXPIRE,
        }
    }
}
