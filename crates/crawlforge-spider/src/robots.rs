//! Per-host robots.txt fetch, cache, and `can_fetch`/crawl-delay lookup.
//!
//! Grounded on the teacher's `riptide-core/src/robots.rs` `RobotsManager`:
//! a `DashMap<host, CachedRobots>` cache, GET `{scheme}://{host}/robots.txt`,
//! `robotstxt::DefaultMatcher::one_agent_allowed_by_robots` for the
//! permission check. Unlike the teacher, there is no rate-limiter/token
//! bucket here — spec.md's crawl delay is a plain `sleep` in the
//! controller's iteration loop, not a standalone limiter subsystem.
//! A missing or failing robots.txt fetch yields a permissive parser
//! (fail-open), per spec.md §4.G/§7.

use std::sync::Arc;

use dashmap::DashMap;
use robotstxt::DefaultMatcher;
use tracing::{debug, warn};

/// One host's fetched-or-defaulted robots.txt content plus whatever
/// crawl-delay directive was found for the configured user agent.
#[derive(Debug, Clone, Default)]
struct CachedRobots {
    content: String,
    crawl_delay: Option<f64>,
}

/// Fetches and caches one robots.txt parser per host. Fail-open: a
/// host whose robots.txt can't be fetched is treated as if it had none
/// (everything permitted).
pub struct RobotsGate {
    client: reqwest::Client,
    user_agent: String,
    cache: Arc<DashMap<String, CachedRobots>>,
}

impl RobotsGate {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: user_agent.into(),
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Whether `url` may be fetched under the cached robots.txt for its
    /// host, for the configured user agent.
    pub async fn can_fetch(&self, scheme: &str, host: &str, url: &str) -> bool {
        let robots = self.get_or_fetch(scheme, host).await;
        if robots.content.is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&robots.content, &self.user_agent, url)
    }

    /// The `Crawl-delay` directive robots.txt specifies for the
    /// configured user agent, if any.
    pub async fn crawl_delay(&self, scheme: &str, host: &str) -> Option<f64> {
        self.get_or_fetch(scheme, host).await.crawl_delay
    }

    async fn get_or_fetch(&self, scheme: &str, host: &str) -> CachedRobots {
        if let Some(cached) = self.cache.get(host) {
            return cached.clone();
        }

        let robots_url = format!("{scheme}://{host}/robots.txt");
        let content = match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
            Ok(resp) => {
                debug!(host, status = %resp.status(), "robots.txt not found, allowing all");
                String::new()
            }
            Err(e) => {
                warn!(host, error = %e, "failed to fetch robots.txt, allowing all");
                String::new()
            }
        };

        let crawl_delay = extract_crawl_delay(&content, &self.user_agent);
        let cached = CachedRobots { content, crawl_delay };
        self.cache.insert(host.to_string(), cached.clone());
        cached
    }
}

/// Scans robots.txt text for a `Crawl-delay:` directive under the
/// block matching `user_agent` (or the `*` wildcard block if no exact
/// match is found). A simple line scan, not a full parser: good enough
/// since `DefaultMatcher` already does permission matching correctly
/// and this only needs the delay number.
fn extract_crawl_delay(content: &str, user_agent: &str) -> Option<f64> {
    let mut in_matching_block = false;
    let mut wildcard_delay = None;
    let mut agent_delay = None;
    let mut current_matches_agent = false;
    let mut current_is_wildcard = false;

    for line in content.lines() {
        let line = line.trim();
        let lowered = line.to_lowercase();
        if let Some(rest) = lowered.strip_prefix("user-agent:") {
            let rest = rest.trim();
            current_matches_agent = rest.eq_ignore_ascii_case(user_agent);
            current_is_wildcard = rest == "*";
            in_matching_block = current_matches_agent || current_is_wildcard;
            continue;
        }
        if !in_matching_block {
            continue;
        }
        if let Some(rest) = lowered.strip_prefix("crawl-delay:") {
            if let Ok(delay) = rest.trim().parse::<f64>() {
                if current_matches_agent {
                    agent_delay = Some(delay);
                } else if current_is_wildcard {
                    wildcard_delay = Some(delay);
                }
            }
        }
    }

    agent_delay.or(wildcard_delay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_crawl_delay_reads_matching_agent_block() {
        let robots = "User-agent: *\nCrawl-delay: 5\n\nUser-agent: crawlforge\nCrawl-delay: 2\n";
        assert_eq!(extract_crawl_delay(robots, "crawlforge"), Some(2.0));
        assert_eq!(extract_crawl_delay(robots, "other-bot"), Some(5.0));
    }

    #[test]
    fn extract_crawl_delay_absent_returns_none() {
        let robots = "User-agent: *\nDisallow: /private\n";
        assert_eq!(extract_crawl_delay(robots, "crawlforge"), None);
    }
}
