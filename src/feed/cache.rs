//! Cache policy and HTTP freshness headers.
//!
//! Everything here is pure: "now" is always passed in by the caller.

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{
    HeaderMap, HeaderValue, CACHE_CONTROL, ETAG, EXPIRES, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};

use super::types::CacheMetadata;

/// Cache lifetime in seconds used when a response carries no freshness headers.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Result of checking a feed's stored cache expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// The cached copy is still valid; do not touch the network.
    Skip,
    /// Fetch the feed.
    Attempt,
}

/// Decide whether a feed needs fetching.
///
/// Skips only when `cache_until` is strictly after `now`.
pub fn evaluate(cache_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> CacheDecision {
    match cache_until {
        Some(until) if until > now => CacheDecision::Skip,
        _ => CacheDecision::Attempt,
    }
}

/// Extract the `max-age` directive from a Cache-Control value.
///
/// Returns 0 when the directive is missing or malformed.
pub fn parse_max_age(cache_control: &str) -> u64 {
    cache_control
        .split(',')
        .map(str::trim)
        .find_map(|directive| directive.strip_prefix("max-age="))
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

/// Read ETag, Last-Modified and the cache expiry from response headers.
///
/// Expiry priority: a valid `Expires` date, then `max-age` when positive,
/// then `now + default_ttl`.
pub fn extract_cache_metadata(
    headers: &HeaderMap,
    now: DateTime<Utc>,
    default_ttl: Duration,
) -> CacheMetadata {
    let etag = header_str(headers, ETAG).map(str::to_string);
    let last_modified = header_str(headers, LAST_MODIFIED).map(str::to_string);

    let expires = header_str(headers, EXPIRES)
        .and_then(|value| httpdate::parse_http_date(value).ok())
        .map(DateTime::<Utc>::from);

    let max_age = header_str(headers, CACHE_CONTROL)
        .map(parse_max_age)
        .filter(|secs| *secs > 0)
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl));

    let cache_until = expires
        .or(max_age)
        .or_else(|| now.checked_add_signed(default_ttl))
        .unwrap_or(now);

    CacheMetadata {
        etag,
        last_modified,
        cache_until,
    }
}

/// Build the conditional request headers for a feed's stored validators.
pub fn conditional_headers(etag: Option<&str>, last_modified: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let validators = [(IF_NONE_MATCH, etag), (IF_MODIFIED_SINCE, last_modified)];
    for (name, value) in validators {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            continue;
        };
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => tracing::debug!(header = %name, "ignoring stored validator with invalid characters"),
        }
    }
    headers
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<&str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
