//! URL normalization.
//!
//! Normalized form is `(scheme-lowercased, host-lowercased, path, query,
//! fragment)` recomposed. Equality, hashing, and set membership all go
//! through the normalized string so a `HashSet<CrawlUrl>` gives the set
//! semantics the frontier needs for free.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{CrawlError, Result};

#[derive(Debug, Clone)]
pub struct CrawlUrl {
    normalized: String,
    inner: url::Url,
}

impl CrawlUrl {
    pub fn parse(raw: &str) -> Result<Self> {
        let inner = url::Url::parse(raw).map_err(CrawlError::InvalidUrl)?;
        Ok(Self::normalize(inner))
    }

    /// Resolve `href` against `base` the same way `urljoin` does, then
    /// normalize. Returns `None` for hrefs that can't be resolved to an
    /// absolute URL (e.g. `mailto:`, malformed input).
    pub fn join(base: &CrawlUrl, href: &str) -> Option<Self> {
        base.inner.join(href).ok().map(Self::normalize)
    }

    fn normalize(mut inner: url::Url) -> Self {
        let scheme = inner.scheme().to_ascii_lowercase();
        let _ = inner.set_scheme(&scheme);
        if let Some(host) = inner.host_str() {
            let lowered = host.to_ascii_lowercase();
            let _ = inner.set_host(Some(&lowered));
        }
        let normalized = inner.to_string();
        Self { normalized, inner }
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn host(&self) -> Option<&str> {
        self.inner.host_str()
    }

    pub fn scheme(&self) -> &str {
        self.inner.scheme()
    }

    /// True when the href is one of the clickable null-href markers
    /// treated as JS-driven navigation rather than a real link.
    pub fn is_clickable_null_href(href: &str) -> bool {
        matches!(href, "#" | "javascript:void(0);" | "javascript:;")
    }

    pub fn into_inner(self) -> url::Url {
        self.inner
    }
}

impl fmt::Display for CrawlUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl PartialEq for CrawlUrl {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}
impl Eq for CrawlUrl {}

impl Hash for CrawlUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl PartialOrd for CrawlUrl {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for CrawlUrl {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_scheme_and_host() {
        let url = CrawlUrl::parse("HTTP://Example.COM/Path?q=1#frag").unwrap();
        assert_eq!(url.as_str(), "http://example.com/Path?q=1#frag");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = CrawlUrl::parse("HTTP://Example.COM/a").unwrap();
        let twice = CrawlUrl::parse(once.as_str()).unwrap();
        assert_eq!(once.as_str(), twice.as_str());
    }

    #[test]
    fn join_resolves_relative_href() {
        let base = CrawlUrl::parse("http://s/a/b").unwrap();
        let joined = CrawlUrl::join(&base, "../c").unwrap();
        assert_eq!(joined.as_str(), "http://s/c");
    }

    #[test]
    fn join_rejects_unresolvable_href() {
        let base = CrawlUrl::parse("http://s/a").unwrap();
        assert!(CrawlUrl::join(&base, "#").is_some());
        // Malformed: no host after the scheme separator.
        assert!(CrawlUrl::join(&base, "http://").is_none());
    }

    #[test]
    fn join_resolves_null_href_schemes_too() {
        // `javascript:` hrefs parse as absolute URLs; callers filter these
        // out via `is_clickable_null_href` before harvesting, not here.
        let base = CrawlUrl::parse("http://s/a").unwrap();
        assert!(CrawlUrl::join(&base, "javascript:void(0);").is_some());
    }

    #[test]
    fn equality_uses_normalized_form() {
        let a = CrawlUrl::parse("HTTP://S/a").unwrap();
        let b = CrawlUrl::parse("http://s/a").unwrap();
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn clickable_null_href_whitelist() {
        assert!(CrawlUrl::is_clickable_null_href("#"));
        assert!(CrawlUrl::is_clickable_null_href("javascript:void(0);"));
        assert!(CrawlUrl::is_clickable_null_href("javascript:;"));
        assert!(!CrawlUrl::is_clickable_null_href("/page"));
    }
}
