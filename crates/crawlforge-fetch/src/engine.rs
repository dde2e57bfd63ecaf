//! Static and rendered URL fetching, bounded by two independent
//! concurrency gates and reissued through a retry map until each URL
//! either succeeds or exhausts its retry budget.
//!
//! Grounded on `response_loader.py`'s `ResponseLoader`: a static path
//! (`get_response`), a rendered path (`get_rendered_response`) that
//! waits on load-states and page-events before reading content, and a
//! batch entry point (`load_responses`) that retries failures until the
//! retry map is empty.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crawlforge_browser::{BrowserPage, BrowserPool};
use crawlforge_events::{Event, EventBus};
use crawlforge_proxy::ProxyPool;
use crawlforge_types::{CrawlError, CrawlUrl, Requirements, Result, ScrapedResponse};
use crawlforge_utils::RetryPolicy;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::retry::RetryState;

/// A fetch result; `page` is populated only by the rendered path.
pub type FetchResponse = ScrapedResponse<BrowserPage>;

/// Configuration mirroring the fetch engine's external config shape:
/// `{max_concurrent_static, max_concurrent_render, use_proxies, render,
/// max_proxies, max_retries, requirements}`.
#[derive(Debug, Clone)]
pub struct FetchEngineConfig {
    pub max_concurrent_static: usize,
    pub max_concurrent_render: usize,
    pub use_proxies: bool,
    pub render: bool,
    pub max_proxies: usize,
    pub max_retries: u32,
    pub requirements: Requirements,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchEngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_static: 60,
            max_concurrent_render: 5,
            use_proxies: false,
            render: false,
            max_proxies: 10,
            max_retries: 0,
            requirements: Requirements::default(),
            request_timeout: Duration::from_secs(30),
            user_agent: "crawlforge/0.1".to_string(),
        }
    }
}

/// Resolves URLs to responses, static or rendered depending on
/// `config.render`, with proxy rotation, readiness gating, and
/// retry-until-exhausted batch semantics.
pub struct FetchEngine {
    config: FetchEngineConfig,
    static_gate: Arc<Semaphore>,
    render_gate: Arc<Semaphore>,
    http_client: reqwest::Client,
    proxy_pool: Option<ProxyPool>,
    browser_pool: Option<Arc<BrowserPool>>,
    events: Arc<EventBus>,
    retry_policy: RetryPolicy,
}

impl FetchEngine {
    pub fn new(
        config: FetchEngineConfig,
        proxy_pool: Option<ProxyPool>,
        browser_pool: Option<Arc<BrowserPool>>,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .brotli(true)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CrawlError::Network(e.to_string()))?;

        Ok(Self {
            static_gate: Arc::new(Semaphore::new(config.max_concurrent_static)),
            render_gate: Arc::new(Semaphore::new(config.max_concurrent_render)),
            config,
            http_client,
            proxy_pool,
            browser_pool,
            events,
            retry_policy: RetryPolicy::default(),
        })
    }

    /// Static path: acquires the static gate, optionally routes through
    /// a random validated proxy (rewriting `https`→`http` when the
    /// proxy's protocol is `http`), and returns the body as text.
    pub async fn get_response(&self, url: &CrawlUrl) -> Result<FetchResponse> {
        let _permit = self
            .static_gate
            .acquire()
            .await
            .map_err(|_| CrawlError::Custom("static fetch gate closed".to_string()))?;

        let mut request_url = url.as_str().to_string();
        let client = if self.config.use_proxies {
            match self.proxy_pool.as_ref().and_then(|p| p.get_random()) {
                Some(proxy) => {
                    if proxy.protocol == "http" && request_url.starts_with("https://") {
                        request_url = format!("http://{}", &request_url["https://".len()..]);
                    }
                    let reqwest_proxy = reqwest::Proxy::all(proxy.formatted())
                        .map_err(|e| CrawlError::Network(e.to_string()))?;
                    reqwest::Client::builder()
                        .user_agent(self.config.user_agent.clone())
                        .gzip(true)
                        .brotli(true)
                        .timeout(self.config.request_timeout)
                        .proxy(reqwest_proxy)
                        .build()
                        .map_err(|e| CrawlError::Network(e.to_string()))?
                }
                None => self.http_client.clone(),
            }
        } else {
            self.http_client.clone()
        };

        let response = client
            .get(&request_url)
            .send()
            .await
            .map_err(|e| CrawlError::Network(e.to_string()))?;
        let status_code = response.status().as_u16();
        let html = response
            .text()
            .await
            .map_err(|e| CrawlError::Network(e.to_string()))?;

        Ok(ScrapedResponse {
            url: url.clone(),
            html,
            status_code,
            page: None,
            href_elements: Vec::new(),
        })
    }

    /// Rendered path: acquires the render gate, checks out a page,
    /// navigates, waits for every configured load-state and page-event
    /// within the overall timeout, then reads content and collects
    /// clickable null-href locators.
    pub async fn get_rendered_response(
        &self,
        url: &CrawlUrl,
        timeout: Duration,
    ) -> Result<FetchResponse> {
        let _permit = self
            .render_gate
            .acquire()
            .await
            .map_err(|_| CrawlError::Custom("render fetch gate closed".to_string()))?;
        let pool = self
            .browser_pool
            .as_ref()
            .ok_or_else(|| CrawlError::configuration("render mode requires a browser pool"))?;

        let browser_page = pool
            .get_page()
            .await
            .map_err(|e| CrawlError::Render(e.to_string()))?;

        let deadline = Instant::now() + timeout;

        tokio::time::timeout(timeout, browser_page.page().goto(url.as_str()))
            .await
            .map_err(|_| CrawlError::Render(format!("navigation to {url} timed out")))?
            .map_err(|e| CrawlError::Render(e.to_string()))?;

        for event in &self.config.requirements.events {
            install_event_watch(browser_page.page(), event).await?;
        }

        // A state/event that never becomes ready within the deadline is
        // not fatal: fall back to whatever the page has rendered so far
        // rather than discarding the fetch outright.
        let mut readiness_timed_out = false;
        for state in &self.config.requirements.states {
            if let Err(e) = wait_for_state(browser_page.page(), state, deadline).await {
                warn!(url = %url, state = %state, error = %e, "readiness state not reached before deadline, falling back to current content");
                readiness_timed_out = true;
                break;
            }
        }
        if !readiness_timed_out {
            for event in &self.config.requirements.events {
                if let Err(e) = wait_for_event(browser_page.page(), event, deadline).await {
                    warn!(url = %url, event = %event, error = %e, "readiness event not observed before deadline, falling back to current content");
                    readiness_timed_out = true;
                    break;
                }
            }
        }

        let mut html = browser_page
            .page()
            .content()
            .await
            .map_err(|e| CrawlError::Render(e.to_string()))?;
        if html.is_empty() {
            html = browser_page
                .page()
                .content()
                .await
                .map_err(|e| CrawlError::Render(e.to_string()))?;
        }

        let href_elements = mark_clickable_null_hrefs(browser_page.page()).await?;
        // spider_chrome's `Page::goto` doesn't surface the navigation's
        // HTTP status, so render mode falls back to content presence and
        // readiness: a timed-out wait is reported as a bad response even
        // though html was captured, per the fallback-content contract.
        let status_code = if readiness_timed_out || html.is_empty() { 400 } else { 200 };

        Ok(ScrapedResponse {
            url: url.clone(),
            html,
            status_code,
            page: Some(browser_page),
            href_elements,
        })
    }

    async fn fetch_one(&self, url: CrawlUrl) -> (CrawlUrl, Result<FetchResponse>) {
        let result = if self.config.render {
            self.get_rendered_response(&url, self.config.request_timeout)
                .await
        } else {
            self.get_response(&url).await
        };
        (url, result)
    }

    /// Batch entry point: fetches every URL, retries non-200 results
    /// until each either succeeds or exceeds `max_retries`, then emits
    /// `new_responses` with `url -> html` for every 200 response.
    pub async fn load_responses(
        &self,
        urls: impl IntoIterator<Item = CrawlUrl>,
    ) -> Result<HashMap<CrawlUrl, FetchResponse>> {
        let mut responses: HashMap<CrawlUrl, FetchResponse> = HashMap::new();
        let mut retry_state: HashMap<CrawlUrl, RetryState> = HashMap::new();

        let initial = join_all(urls.into_iter().map(|u| self.fetch_one(u))).await;
        for (url, result) in initial {
            self.record_attempt(url, result, &mut responses, &mut retry_state);
        }

        loop {
            let mut eligible = Vec::new();
            let mut dropped = Vec::new();
            for (url, state) in retry_state.iter() {
                if state.is_eligible(self.config.max_retries) {
                    eligible.push(url.clone());
                } else {
                    dropped.push(url.clone());
                }
            }
            for url in dropped {
                warn!(url = %url, "exhausted retry budget, dropping");
                retry_state.remove(&url);
            }
            if eligible.is_empty() {
                break;
            }

            let round = eligible
                .iter()
                .filter_map(|u| retry_state.get(u))
                .filter_map(|state| match state {
                    RetryState::Retrying(n) => Some(*n),
                    _ => None,
                })
                .min()
                .unwrap_or(0);
            let backoff = self.retry_policy.backoff_duration(round as usize);
            debug!(round, ?backoff, pending = eligible.len(), "backing off before retry round");
            sleep(backoff).await;

            let retried = join_all(eligible.into_iter().map(|u| self.fetch_one(u))).await;
            for (url, result) in retried {
                self.record_attempt(url, result, &mut responses, &mut retry_state);
            }
        }

        let html_map: HashMap<String, String> = responses
            .iter()
            .filter(|(_, resp)| resp.status_code == 200)
            .map(|(url, resp)| (url.as_str().to_string(), resp.html.clone()))
            .collect();
        info!(count = html_map.len(), "emitting new_responses");
        self.events
            .async_trigger(Event::new("new_responses", "fetch", html_map))
            .await
            .map_err(CrawlError::Other)?;

        Ok(responses)
    }

    fn record_attempt(
        &self,
        url: CrawlUrl,
        result: Result<FetchResponse>,
        responses: &mut HashMap<CrawlUrl, FetchResponse>,
        retry_state: &mut HashMap<CrawlUrl, RetryState>,
    ) {
        match result {
            Ok(resp) if resp.status_code == 200 => {
                debug!(url = %url, "fetch succeeded");
                retry_state.remove(&url);
                responses.insert(url, resp);
            }
            Ok(resp) => {
                warn!(url = %url, status = resp.status_code, "non-200 response, queued for retry");
                let next = retry_state.get(&url).copied().unwrap_or_default().record_failure();
                retry_state.insert(url, next);
            }
            Err(e) => {
                warn!(url = %url, error = %e, "fetch failed, queued for retry");
                let next = retry_state.get(&url).copied().unwrap_or_default().record_failure();
                retry_state.insert(url, next);
            }
        }
    }

    /// Returns a rendered page to the pool, or disposes of it.
    pub async fn release_page(&self, page: BrowserPage, feed_into_pool: bool) {
        if let Some(pool) = &self.browser_pool {
            pool.close_page(page, feed_into_pool).await;
        }
    }

    /// Clicks a null-href locator on an already-checked-out rendered
    /// page. Used by the crawl controller's AJAX click-through: the
    /// click triggers page-internal navigation/XHR in place, so there
    /// is nothing to fetch yet, only a DOM to mutate.
    pub async fn click_locator(&self, page: &BrowserPage, selector: &str) -> Result<()> {
        let element = page
            .page()
            .find_element(selector)
            .await
            .map_err(|e| CrawlError::Render(format!("locator '{selector}' not found: {e}")))?;
        element
            .click()
            .await
            .map_err(|e| CrawlError::Render(format!("click on '{selector}' failed: {e}")))?;
        Ok(())
    }

    /// Re-captures content from a page already checked out and clicked
    /// on, rather than navigating it fresh. Per spec: "reissue a
    /// rendered fetch for the page's current URL (which may be
    /// unchanged)" — the point is to capture whatever the click
    /// produced, not to repeat navigation. On any failure the page is
    /// still handed back to the pool before the error is returned, so
    /// a failed recapture never leaks the checkout.
    pub async fn recapture_rendered(&self, page: BrowserPage) -> Result<FetchResponse> {
        match Self::recapture_content(&page).await {
            Ok((url, html, href_elements)) => {
                let status_code = if html.is_empty() { 400 } else { 200 };
                Ok(ScrapedResponse {
                    url,
                    html,
                    status_code,
                    page: Some(page),
                    href_elements,
                })
            }
            Err(e) => {
                self.release_page(page, false).await;
                Err(e)
            }
        }
    }

    async fn recapture_content(page: &BrowserPage) -> Result<(CrawlUrl, String, Vec<String>)> {
        let current_url: String = page
            .page()
            .evaluate("location.href")
            .await
            .map_err(|e| CrawlError::Render(e.to_string()))?
            .into_value()
            .map_err(|e| CrawlError::Render(e.to_string()))?;
        let url = CrawlUrl::parse(&current_url)?;

        let mut html = page
            .page()
            .content()
            .await
            .map_err(|e| CrawlError::Render(e.to_string()))?;
        if html.is_empty() {
            html = page
                .page()
                .content()
                .await
                .map_err(|e| CrawlError::Render(e.to_string()))?;
        }

        let href_elements = mark_clickable_null_hrefs(page.page()).await?;
        Ok((url, html, href_elements))
    }
}

fn state_ready_expr(state: &str) -> &'static str {
    match state {
        "domcontentloaded" => "document.readyState !== 'loading'",
        "load" => "document.readyState === 'complete'",
        // No native network-idle signal is available through
        // `page.evaluate`; approximate it with full document load.
        "networkidle" => "document.readyState === 'complete'",
        _ => "true",
    }
}

async fn wait_for_state(page: &spider_chrome::Page, state: &str, deadline: Instant) -> Result<()> {
    poll_until(page, state_ready_expr(state), deadline).await
}

async fn install_event_watch(page: &spider_chrome::Page, event: &str) -> Result<()> {
    let script = format!(
        "(() => {{ window.__crawlforge_events = window.__crawlforge_events || {{}}; \
         window.__crawlforge_events['{event}'] = false; \
         window.addEventListener('{event}', () => {{ window.__crawlforge_events['{event}'] = true; }}, {{ once: true }}); }})()"
    );
    page.evaluate(script.as_str())
        .await
        .map_err(|e| CrawlError::Render(e.to_string()))?;
    Ok(())
}

async fn wait_for_event(page: &spider_chrome::Page, event: &str, deadline: Instant) -> Result<()> {
    let expr = format!("window.__crawlforge_events && window.__crawlforge_events['{event}'] === true");
    poll_until(page, &expr, deadline).await
}

async fn poll_until(page: &spider_chrome::Page, expr: &str, deadline: Instant) -> Result<()> {
    loop {
        let ready: bool = page
            .evaluate(expr)
            .await
            .map_err(|e| CrawlError::Render(e.to_string()))?
            .into_value()
            .unwrap_or(false);
        if ready {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(CrawlError::Render(format!(
                "timed out waiting for readiness predicate `{expr}`"
            )));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Tags every `<a href>` whose href is a clickable null-href marker
/// with a unique attribute and returns one CSS-selector locator per
/// tagged element, in document order.
async fn mark_clickable_null_hrefs(page: &spider_chrome::Page) -> Result<Vec<String>> {
    let script = r#"(() => {
        const clickable = new Set(['#', 'javascript:void(0);', 'javascript:;']);
        const ids = [];
        document.querySelectorAll('a[href]').forEach((a) => {
            const href = a.getAttribute('href');
            if (clickable.has(href)) {
                const id = 'cf-click-' + Math.random().toString(36).slice(2);
                a.setAttribute('data-crawlforge-click', id);
                ids.push(id);
            }
        });
        return ids;
    })()"#;
    let ids: Vec<String> = page
        .evaluate(script)
        .await
        .map_err(|e| CrawlError::Render(e.to_string()))?
        .into_value()
        .unwrap_or_default();

    Ok(ids
        .into_iter()
        .map(|id| format!("[data-crawlforge-click=\"{id}\"]"))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_ready_expr_covers_whitelist() {
        assert!(state_ready_expr("domcontentloaded").contains("readyState"));
        assert!(state_ready_expr("load").contains("complete"));
        assert!(state_ready_expr("unknown-state") == "true");
    }

    #[tokio::test]
    async fn load_responses_emits_new_responses_for_200s_only() {
        let mock = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/ok"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&mock)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/missing"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&mock)
            .await;

        let events = Arc::new(EventBus::new());
        events.start().await;

        let engine = FetchEngine::new(
            FetchEngineConfig {
                max_retries: 0,
                ..Default::default()
            },
            None,
            None,
            events.clone(),
        )
        .unwrap();

        let ok_url = CrawlUrl::parse(&format!("{}/ok", mock.uri())).unwrap();
        let missing_url = CrawlUrl::parse(&format!("{}/missing", mock.uri())).unwrap();

        let responses = engine
            .load_responses([ok_url.clone(), missing_url])
            .await
            .unwrap();

        assert_eq!(responses.len(), 1);
        assert!(responses.contains_key(&ok_url));

        events.close().await;
    }

    #[tokio::test]
    async fn load_responses_retries_until_max_retries_then_drops() {
        let mock = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/flaky"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&mock)
            .await;

        let events = Arc::new(EventBus::new());
        events.start().await;

        let engine = FetchEngine::new(
            FetchEngineConfig {
                max_retries: 2,
                ..Default::default()
            },
            None,
            None,
            events.clone(),
        )
        .unwrap();

        let url = CrawlUrl::parse(&format!("{}/flaky", mock.uri())).unwrap();
        let responses = engine.load_responses([url.clone()]).await.unwrap();

        assert!(responses.is_empty());
        assert_eq!(mock.received_requests().await.unwrap().len(), 3);

        events.close().await;
    }
}
