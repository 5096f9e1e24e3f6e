//! Conditional feed fetcher with security measures.
//!
//! One GET per call, with validators attached when known. Requests are
//! bounded by a timeout, a redirect limit and a body size limit, and hosts on
//! loopback or private networks are refused unless explicitly allowed.

use std::net::IpAddr;
use std::sync::Arc;

use reqwest::header::ACCEPT;
use reqwest::{redirect, Client, StatusCode};
use url::Url;

use super::cache::{conditional_headers, extract_cache_metadata};
use super::parser::parse_feed;
use super::types::{CacheMetadata, ParsedFeed};
use crate::clock::Clock;
use crate::config::FeedConfig;
use crate::{Result, RssGridError};

/// Content types the parser understands.
pub const ACCEPT_FEEDS: &str = "application/rss+xml, application/atom+xml, application/json";

/// Result of a fetch that reached the server.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The server answered 304; stored content is still current.
    NotModified,
    /// The server answered 200 with a parsed document.
    Modified {
        /// The parsed feed.
        feed: ParsedFeed,
        /// Freshness metadata from the response headers.
        cache: CacheMetadata,
    },
}

/// HTTP fetcher for feed documents.
pub struct FeedFetcher {
    client: Client,
    clock: Arc<dyn Clock>,
    max_feed_size: u64,
    default_ttl: chrono::Duration,
    allow_private_hosts: bool,
}

impl FeedFetcher {
    /// Create a fetcher from feed configuration.
    pub fn new(config: &FeedConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let allow_private_hosts = config.allow_private_hosts;
        let max_redirects = config.max_redirects;

        // Every redirect hop gets the same host check as the original URL
        let policy = redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= max_redirects {
                attempt.error("too many redirects")
            } else if let Err(e) = validate_url(attempt.url().as_str(), allow_private_hosts) {
                attempt.error(e.to_string())
            } else {
                attempt.follow()
            }
        });

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.fetch_timeout())
            .redirect(policy)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| RssGridError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            clock,
            max_feed_size: config.max_feed_size_bytes,
            default_ttl: config.default_cache_ttl(),
            allow_private_hosts,
        })
    }

    /// Fetch a feed, sending `If-None-Match` / `If-Modified-Since` when the
    /// validators are known.
    ///
    /// Any status other than 200 or 304 is a fetch error.
    pub async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchOutcome> {
        let target =
            validate_url(url, self.allow_private_hosts).map_err(|e| RssGridError::fetch(url, e))?;

        let mut response = self
            .client
            .get(target)
            .header(ACCEPT, ACCEPT_FEEDS)
            .headers(conditional_headers(etag, last_modified))
            .send()
            .await
            .map_err(|e| RssGridError::fetch(url, describe(&e)))?;

        match response.status() {
            StatusCode::NOT_MODIFIED => return Ok(FetchOutcome::NotModified),
            StatusCode::OK => {}
            status => return Err(RssGridError::fetch(url, format!("HTTP status {status}"))),
        }

        if let Some(length) = response.content_length() {
            if length > self.max_feed_size {
                return Err(RssGridError::fetch(
                    url,
                    format!(
                        "feed too large: {} bytes (max {} bytes)",
                        length, self.max_feed_size
                    ),
                ));
            }
        }

        let cache = extract_cache_metadata(response.headers(), self.clock.now(), self.default_ttl);

        // Content-Length may be missing or wrong, so count while reading
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| RssGridError::fetch(url, describe(&e)))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_feed_size {
                return Err(RssGridError::fetch(
                    url,
                    format!("feed too large: exceeds {} bytes", self.max_feed_size),
                ));
            }
            body.extend_from_slice(&chunk);
        }

        let feed = parse_feed(&body)?;
        Ok(FetchOutcome::Modified { feed, cache })
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    }
}

/// Validate a feed URL.
///
/// The scheme must be http or https and the URL must have a host. Unless
/// `allow_private_hosts` is set, local hostnames and loopback, private,
/// link-local and similar IP literals are rejected.
pub fn validate_url(url: &str, allow_private_hosts: bool) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| RssGridError::Validation(format!("invalid URL: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RssGridError::Validation(format!(
            "unsupported URL scheme: {}",
            parsed.scheme()
        )));
    }

    let host = parsed
        .host()
        .ok_or_else(|| RssGridError::Validation("URL has no host".to_string()))?;

    if allow_private_hosts {
        return Ok(parsed);
    }

    let blocked = match host {
        url::Host::Domain(domain) => is_forbidden_hostname(domain),
        url::Host::Ipv4(ip) => is_private_ip(&IpAddr::V4(ip)),
        url::Host::Ipv6(ip) => is_private_ip(&IpAddr::V6(ip)),
    };
    if blocked {
        return Err(RssGridError::Validation(format!("forbidden host: {host}")));
    }

    Ok(parsed)
}

fn is_forbidden_hostname(host: &str) -> bool {
    const SUFFIXES: [&str; 7] = [
        ".local",
        ".localhost",
        ".internal",
        ".intranet",
        ".corp",
        ".home",
        ".lan",
    ];

    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == "localhost" || SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.is_documentation()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local fc00::/7
                || (first & 0xffc0) == 0xfe80 // link-local fe80::/10
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[test]
    fn test_validate_url_accepts_public_hosts() {
        assert!(validate_url("https://example.com/feed.xml", false).is_ok());
        assert!(validate_url("http://example.com/rss", false).is_ok());
        assert!(validate_url("https://8.8.8.8/feed", false).is_ok());
    }

    #[test]
    fn test_validate_url_rejects_bad_scheme() {
        for url in ["ftp://example.com/feed", "file:///etc/passwd", "not a url"] {
            assert!(
                matches!(validate_url(url, true), Err(RssGridError::Validation(_))),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_url_rejects_local_hosts() {
        for url in [
            "http://localhost/feed",
            "http://LOCALHOST./feed",
            "http://printer.local/feed",
            "http://api.internal/feed",
            "http://127.0.0.1/feed",
            "http://10.0.0.1/feed",
            "http://172.16.0.1/feed",
            "http://192.168.1.1/feed",
            "http://169.254.169.254/latest/meta-data",
            "http://0.0.0.0/feed",
            "http://[::1]/feed",
            "http://[fd00::1]/feed",
            "http://[fe80::1]/feed",
            "http://[::ffff:127.0.0.1]/feed",
        ] {
            assert!(validate_url(url, false).is_err(), "{url} should be rejected");
        }
    }

    #[test]
    fn test_validate_url_allow_private_hosts() {
        assert!(validate_url("http://127.0.0.1:8080/feed", true).is_ok());
        assert!(validate_url("http://localhost/feed", true).is_ok());
    }

    #[test]
    fn test_is_private_ip() {
        assert!(is_private_ip(&"172.31.255.255".parse().unwrap()));
        assert!(!is_private_ip(&"172.32.0.1".parse().unwrap()));
        assert!(is_private_ip(&"192.0.2.1".parse().unwrap()));
        assert!(!is_private_ip(&"1.1.1.1".parse().unwrap()));
        assert!(!is_private_ip(&"2606:4700::1111".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_fetch_blocked_host_is_fetch_error() {
        let fetcher = FeedFetcher::new(&FeedConfig::default(), Arc::new(SystemClock)).unwrap();
        let err = fetcher
            .fetch("http://127.0.0.1/feed.xml", None, None)
            .await
            .unwrap_err();

        match err {
            RssGridError::Fetch { url, .. } => assert_eq!(url, "http://127.0.0.1/feed.xml"),
            other => panic!("expected fetch error, got {other:?}"),
        }
    }
}
