//! Admission gating for URLs discovered during a crawl: domain
//! allow-list, optional URL-pattern allow-list, and robots.txt.
//!
//! Grounded on `Crawler._is_url_allowed` (`scraping/crawler.py`): all
//! three checks must pass, in the same order (patterns before robots,
//! since a pattern miss is a cheap rejection that avoids a robots.txt
//! fetch).

use crawlforge_types::CrawlUrl;
use regex::Regex;

use crate::robots::RobotsGate;

/// Compiled admission rules for one crawl.
pub struct Gate {
    allowed_domains: Vec<String>,
    url_patterns: Vec<Regex>,
    ignore_robots_txt: bool,
}

impl Gate {
    pub fn new(
        allowed_domains: Vec<String>,
        url_patterns: &[String],
        ignore_robots_txt: bool,
    ) -> Self {
        let url_patterns = url_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        Self {
            allowed_domains,
            url_patterns,
            ignore_robots_txt,
        }
    }

    fn domain_allowed(&self, url: &CrawlUrl) -> bool {
        match url.host() {
            Some(host) => self.allowed_domains.iter().any(|d| d == host),
            None => false,
        }
    }

    fn pattern_allowed(&self, url: &CrawlUrl) -> bool {
        self.url_patterns.is_empty() || self.url_patterns.iter().any(|p| p.is_match(url.as_str()))
    }

    /// Runs every gating check in order, short-circuiting on the first
    /// failure (cheapest checks first; robots.txt fetch is the most
    /// expensive so it runs last).
    pub async fn admit(&self, url: &CrawlUrl, robots: &RobotsGate) -> bool {
        if !self.domain_allowed(url) {
            return false;
        }
        if !self.pattern_allowed(url) {
            return false;
        }
        if self.ignore_robots_txt {
            return true;
        }
        let Some(host) = url.host() else {
            return false;
        };
        robots.can_fetch(url.scheme(), host, url.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_gate_rejects_other_hosts() {
        let gate = Gate::new(vec!["s".to_string()], &[], true);
        let url = CrawlUrl::parse("http://other/x").unwrap();
        assert!(!gate.domain_allowed(&url));
    }

    #[test]
    fn pattern_gate_requires_at_least_one_match() {
        let gate = Gate::new(vec!["s".to_string()], &["/catalog/".to_string()], true);
        let hit = CrawlUrl::parse("http://s/catalog/1").unwrap();
        let miss = CrawlUrl::parse("http://s/about").unwrap();
        assert!(gate.pattern_allowed(&hit));
        assert!(!gate.pattern_allowed(&miss));
    }

    #[test]
    fn empty_pattern_list_admits_everything() {
        let gate = Gate::new(vec!["s".to_string()], &[], true);
        let url = CrawlUrl::parse("http://s/anything").unwrap();
        assert!(gate.pattern_allowed(&url));
    }
}
