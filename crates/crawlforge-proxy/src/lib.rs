//! Proxy Pool: fetches a list of candidate proxies from an external
//! provider, validates each against a known-good URL, and hands out a
//! random validated proxy to the fetch engine.
//!
//! The pool is append-only for the lifetime of a process: validation
//! happens once, up front, and there is no background refresh.

use std::time::Duration;

use async_trait::async_trait;
use crawlforge_types::{CrawlError, Proxy, Result};
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::{debug, warn};

/// Where raw `protocol://ip:port` candidates come from before validation.
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Fetches up to `max` candidate proxies.
    async fn fetch_candidates(&self, max: usize) -> Result<Vec<Proxy>>;
}

/// Default [`ProxySource`]: a plain-text HTTP endpoint with one
/// `protocol://ip:port` candidate per line. `socks*` protocols are
/// skipped since the fetch engine only speaks HTTP(S) through a proxy.
pub struct HttpProxySource {
    provider_url: String,
    client: reqwest::Client,
}

impl HttpProxySource {
    /// Builds a source pointed at `provider_url`.
    pub fn new(provider_url: impl Into<String>) -> Self {
        Self {
            provider_url: provider_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn parse_line(re: &Regex, line: &str) -> Option<Proxy> {
        let caps = re.captures(line.trim())?;
        let protocol = caps.get(1)?.as_str().to_lowercase();
        if protocol.starts_with("socks") {
            return None;
        }
        let ip = caps.get(2)?.as_str().to_string();
        let port: u16 = caps.get(3)?.as_str().parse().ok()?;
        Some(Proxy { protocol, ip, port })
    }
}

#[async_trait]
impl ProxySource for HttpProxySource {
    async fn fetch_candidates(&self, max: usize) -> Result<Vec<Proxy>> {
        let body = self
            .client
            .get(&self.provider_url)
            .send()
            .await
            .map_err(|e| CrawlError::Network(e.to_string()))?
            .text()
            .await
            .map_err(|e| CrawlError::Network(e.to_string()))?;

        let re = Regex::new(r"^([a-zA-Z0-9]+)://([^:\s]+):(\d{1,5})$")
            .expect("static proxy line regex is valid");

        let candidates = body
            .lines()
            .filter_map(|line| Self::parse_line(&re, line))
            .take(max)
            .collect();

        Ok(candidates)
    }
}

/// Config for proxy validation: the test URL a candidate must reach
/// with a 200 within `timeout` to be kept.
#[derive(Debug, Clone)]
pub struct ProxyValidationConfig {
    /// URL used to test each candidate proxy.
    pub test_url: String,
    /// Per-candidate validation timeout.
    pub timeout: Duration,
}

impl Default for ProxyValidationConfig {
    fn default() -> Self {
        Self {
            test_url: "https://www.google.com".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// A pool of validated proxies, loaded once from a [`ProxySource`].
#[derive(Clone)]
pub struct ProxyPool {
    validated: Vec<Proxy>,
}

impl ProxyPool {
    /// Loads up to `max_proxies` candidates from `source`, validates
    /// each, and keeps only the ones that respond 200 within
    /// `config.timeout`.
    pub async fn load(
        source: &dyn ProxySource,
        max_proxies: usize,
        config: ProxyValidationConfig,
    ) -> Result<Self> {
        let candidates = source.fetch_candidates(max_proxies).await?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CrawlError::Network(e.to_string()))?;

        let mut validated = Vec::new();
        for proxy in candidates {
            match Self::validate_one(&client, &proxy, &config.test_url).await {
                Ok(true) => {
                    debug!(proxy = %proxy.formatted(), "proxy validated");
                    validated.push(proxy);
                }
                Ok(false) => {
                    debug!(proxy = %proxy.formatted(), "proxy rejected: non-200");
                }
                Err(e) => {
                    warn!(proxy = %proxy.formatted(), error = %e, "proxy validation failed");
                }
            }
        }

        Ok(Self { validated })
    }

    async fn validate_one(
        client: &reqwest::Client,
        proxy: &Proxy,
        test_url: &str,
    ) -> Result<bool> {
        let proxy_url = proxy.formatted();
        let reqwest_proxy =
            reqwest::Proxy::all(&proxy_url).map_err(|e| CrawlError::Network(e.to_string()))?;
        let client = client
            .clone()
            .proxy(reqwest_proxy)
            .build()
            .map_err(|e| CrawlError::Network(e.to_string()))?;

        match client.get(test_url).send().await {
            Ok(resp) => Ok(resp.status().as_u16() == 200),
            Err(_) => Ok(false),
        }
    }

    /// An empty pool (proxies disabled, or nothing validated).
    pub fn empty() -> Self {
        Self {
            validated: Vec::new(),
        }
    }

    /// Returns a random validated proxy, or `None` if the pool is empty.
    pub fn get_random(&self) -> Option<&Proxy> {
        self.validated.choose(&mut rand::thread_rng())
    }

    /// Number of validated proxies currently held.
    pub fn len(&self) -> usize {
        self.validated.len()
    }

    /// Whether the pool has no validated proxies.
    pub fn is_empty(&self) -> bool {
        self.validated.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_skips_socks() {
        let re = Regex::new(r"^([a-zA-Z0-9]+)://([^:\s]+):(\d{1,5})$").unwrap();
        assert!(HttpProxySource::parse_line(&re, "socks5://1.2.3.4:1080").is_none());
    }

    #[test]
    fn parse_line_accepts_http() {
        let re = Regex::new(r"^([a-zA-Z0-9]+)://([^:\s]+):(\d{1,5})$").unwrap();
        let proxy = HttpProxySource::parse_line(&re, "http://1.2.3.4:8080").unwrap();
        assert_eq!(proxy.protocol, "http");
        assert_eq!(proxy.ip, "1.2.3.4");
        assert_eq!(proxy.port, 8080);
    }

    #[test]
    fn parse_line_rejects_malformed() {
        let re = Regex::new(r"^([a-zA-Z0-9]+)://([^:\s]+):(\d{1,5})$").unwrap();
        assert!(HttpProxySource::parse_line(&re, "not a proxy line").is_none());
    }

    #[test]
    fn empty_pool_returns_none() {
        let pool = ProxyPool::empty();
        assert!(pool.get_random().is_none());
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn load_validates_against_mock_server() {
        let mock = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&mock)
            .await;

        struct StaticSource(Vec<Proxy>);
        #[async_trait]
        impl ProxySource for StaticSource {
            async fn fetch_candidates(&self, max: usize) -> Result<Vec<Proxy>> {
                Ok(self.0.iter().take(max).cloned().collect())
            }
        }

        let source = StaticSource(vec![Proxy {
            protocol: "http".to_string(),
            ip: "127.0.0.1".to_string(),
            port: 1, // unreachable, validation should just reject it quietly
        }]);

        let pool = ProxyPool::load(
            &source,
            10,
            ProxyValidationConfig {
                test_url: mock.uri(),
                timeout: Duration::from_millis(500),
            },
        )
        .await
        .unwrap();

        // The candidate proxy is not a real listening proxy, so it cannot
        // actually tunnel to the mock server; validation rejects it rather
        // than panicking or propagating an error.
        assert!(pool.is_empty());
    }
}
