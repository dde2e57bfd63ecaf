//! Harvests child URLs from fetched HTML.
//!
//! Grounded on the original `Crawler.extract_links` (`scraping/crawler.py`):
//! iterate every `<a href>`, attempt to build an absolute URL from each
//! href relative to the page it came from. Null-href markers are
//! excluded here since they are collected separately as click-through
//! locators by the fetch engine, not followed as links.

use crawlforge_types::CrawlUrl;
use scraper::{Html, Selector};

/// One anchor visited while harvesting links, whether or not it
/// resolved to a usable URL. Mirrors the original's
/// `_total_link_build_attempts` counter, which counts every `<a>`
/// tag seen regardless of outcome.
pub struct LinkHarvest {
    pub urls: Vec<CrawlUrl>,
    pub attempts: u64,
}

/// Extracts every resolvable, non-null-href anchor target from `html`,
/// relative to `base`.
pub fn extract_links(base: &CrawlUrl, html: &str) -> LinkHarvest {
    let selector = Selector::parse("a[href]").expect("static selector is valid");
    let document = Html::parse_document(html);

    let mut urls = Vec::new();
    let mut attempts = 0u64;

    for anchor in document.select(&selector) {
        attempts += 1;
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if CrawlUrl::is_clickable_null_href(href) {
            continue;
        }
        if let Some(url) = CrawlUrl::join(base, href) {
            urls.push(url);
        }
    }

    LinkHarvest { urls, attempts }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_links_resolves_relative_hrefs() {
        let base = CrawlUrl::parse("http://s/a/").unwrap();
        let html = r#"<a href="b">B</a><a href="/c">C</a>"#;
        let harvest = extract_links(&base, html);
        let urls: Vec<String> = harvest.urls.iter().map(|u| u.as_str().to_string()).collect();
        assert_eq!(urls, vec!["http://s/a/b".to_string(), "http://s/c".to_string()]);
        assert_eq!(harvest.attempts, 2);
    }

    #[test]
    fn extract_links_excludes_null_href_but_still_counts_attempt() {
        let base = CrawlUrl::parse("http://s/a").unwrap();
        let html = r#"<a href="#">click me</a><a href="/b">B</a>"#;
        let harvest = extract_links(&base, html);
        assert_eq!(harvest.urls.len(), 1);
        assert_eq!(harvest.attempts, 2);
    }
}
