//! One `target_urls` entry, defaulted per spec.md §4.I, and the
//! per-seed [`crawlforge_fetch::FetchEngineConfig`] /
//! [`crawlforge_spider::CrawlerConfig`] it materializes.
//!
//! Grounded on `ConfigLoader._build_options`/`_build_crawlers_setup_data`
//! (`loaders/config_loader.py`), generalized to the fuller default set
//! spec.md §4.I names.

use crawlforge_fetch::FetchEngineConfig;
use crawlforge_spider::CrawlerConfig;
use crawlforge_types::{CrawlError, CrawlUrl, Requirements, Result};
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub url: CrawlUrl,
    pub only_scrape_sub_pages: bool,
    pub use_proxies: bool,
    pub render_pages: bool,
    pub max_retries: u32,
    pub ignore_robots_txt: bool,
    pub crawl_delay: f64,
    pub max_depth: u32,
    pub allowed_domains: Vec<String>,
    pub url_patterns: Vec<String>,
}

impl SeedConfig {
    pub fn from_value(raw: &Value) -> Result<Self> {
        let url_str = raw
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| CrawlError::configuration("target_urls entry missing 'url'"))?;
        let url = CrawlUrl::parse(url_str)?;

        let options = raw.get("options");
        let only_scrape_sub_pages = options
            .and_then(|o| o.get("only_scrape_sub_pages"))
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let loader = raw.get("response_loader");
        let use_proxies = loader
            .and_then(|o| o.get("use_proxies"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let render_pages = loader
            .and_then(|o| o.get("render_pages"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let max_retries = loader
            .and_then(|o| o.get("max_retries"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;

        let crawler = raw.get("crawler");
        let ignore_robots_txt = crawler
            .and_then(|o| o.get("ignore_robots_txt"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let crawl_delay = crawler
            .and_then(|o| o.get("crawl_delay"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let max_depth = crawler
            .and_then(|o| o.get("max_depth"))
            .and_then(Value::as_u64)
            .unwrap_or(6) as u32;

        let default_domain: Vec<String> = url.host().map(str::to_string).into_iter().collect();
        let allowed_domains = crawler
            .and_then(|o| o.get("allowed_domains"))
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or(default_domain);

        let url_patterns = crawler
            .and_then(|o| o.get("url_patterns"))
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            url,
            only_scrape_sub_pages,
            use_proxies,
            render_pages,
            max_retries,
            ignore_robots_txt,
            crawl_delay,
            max_depth,
            allowed_domains,
            url_patterns,
        })
    }
}

pub fn materialize_crawler_config(seed: &SeedConfig, user_agent: String) -> CrawlerConfig {
    CrawlerConfig {
        seed: seed.url.clone(),
        allowed_domains: seed.allowed_domains.clone(),
        max_depth: seed.max_depth,
        crawl_delay: seed.crawl_delay,
        ignore_robots_txt: seed.ignore_robots_txt,
        render_pages: seed.render_pages,
        url_patterns: seed.url_patterns.clone(),
        user_agent,
    }
}

pub fn materialize_fetch_config(
    seed: &SeedConfig,
    requirements: Requirements,
    user_agent: String,
) -> FetchEngineConfig {
    FetchEngineConfig {
        use_proxies: seed.use_proxies,
        render: seed.render_pages,
        max_retries: seed.max_retries,
        requirements,
        user_agent,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_spec() {
        let raw = json!({"url": "http://S/a"});
        let seed = SeedConfig::from_value(&raw).unwrap();
        assert!(seed.only_scrape_sub_pages);
        assert!(!seed.use_proxies);
        assert!(!seed.render_pages);
        assert_eq!(seed.max_retries, 0);
        assert!(!seed.ignore_robots_txt);
        assert_eq!(seed.crawl_delay, 0.0);
        assert_eq!(seed.max_depth, 6);
        assert_eq!(seed.allowed_domains, vec!["s".to_string()]);
    }

    #[test]
    fn missing_url_is_a_configuration_error() {
        let raw = json!({});
        assert!(SeedConfig::from_value(&raw).is_err());
    }

    #[test]
    fn explicit_options_override_defaults() {
        let raw = json!({
            "url": "http://s/a",
            "options": {"only_scrape_sub_pages": false},
            "response_loader": {"use_proxies": true, "render_pages": true, "max_retries": 3},
            "crawler": {"ignore_robots_txt": true, "crawl_delay": 1.5, "max_depth": 2, "allowed_domains": ["other"]},
        });
        let seed = SeedConfig::from_value(&raw).unwrap();
        assert!(!seed.only_scrape_sub_pages);
        assert!(seed.use_proxies);
        assert!(seed.render_pages);
        assert_eq!(seed.max_retries, 3);
        assert!(seed.ignore_robots_txt);
        assert_eq!(seed.crawl_delay, 1.5);
        assert_eq!(seed.max_depth, 2);
        assert_eq!(seed.allowed_domains, vec!["other".to_string()]);
    }
}
