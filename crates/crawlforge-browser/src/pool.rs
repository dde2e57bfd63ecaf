//! Browser Pool: a bounded pool of reusable render contexts ("pages")
//! backed by a single lazily-launched Chrome instance.
//!
//! Grounded on the teacher's browser-instance pool (unique profile
//! directory per browser, a spawned task draining the CDP event
//! handler) but pools *pages* rather than whole browser processes,
//! since the crawler only ever needs one Chrome process with many tabs.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::StreamExt;
use spider_chrome::{Browser, BrowserConfig, Page};
use tempfile::TempDir;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Bounds and launch settings for the pool.
#[derive(Clone, Debug)]
pub struct BrowserPoolConfig {
    /// Maximum number of pages checked out concurrently.
    pub max_pages: usize,
    /// Extra Chromium command-line flags.
    pub launch_args: Vec<String>,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            max_pages: 5,
            launch_args: vec![
                "--no-sandbox".to_string(),
                "--disable-dev-shm-usage".to_string(),
                "--disable-gpu".to_string(),
            ],
        }
    }
}

/// A checked-out render context. Ownership is transferred to the
/// caller by [`BrowserPool::get_page`]; the caller must pass it back to
/// [`BrowserPool::close_page`] exactly once.
pub struct BrowserPage {
    pub id: Uuid,
    page: Page,
    _permit: OwnedSemaphorePermit,
}

impl BrowserPage {
    /// The underlying `spider_chrome` page.
    pub fn page(&self) -> &Page {
        &self.page
    }
}

struct LaunchedBrowser {
    #[allow(dead_code)]
    browser: Arc<Browser>,
    #[allow(dead_code)]
    handler_task: tokio::task::JoinHandle<()>,
    #[allow(dead_code)]
    temp_dir: TempDir,
}

/// Pool of reusable `Page` render contexts, initialized lazily on the
/// first rendered fetch.
pub struct BrowserPool {
    config: BrowserPoolConfig,
    semaphore: Arc<Semaphore>,
    browser: Mutex<Option<LaunchedBrowser>>,
    free: Mutex<VecDeque<Page>>,
}

impl BrowserPool {
    pub fn new(config: BrowserPoolConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_pages));
        Self {
            config,
            semaphore,
            browser: Mutex::new(None),
            free: Mutex::new(VecDeque::new()),
        }
    }

    async fn ensure_browser(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let temp_dir = TempDir::new().map_err(|e| anyhow!("failed to create profile dir: {e}"))?;
        let mut builder = BrowserConfig::builder();
        for arg in &self.config.launch_args {
            builder = builder.arg(arg.clone());
        }
        let mut browser_config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;
        browser_config.user_data_dir = Some(temp_dir.path().to_path_buf());

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| anyhow!("failed to launch browser: {e}"))?;
        let browser = Arc::new(browser);

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!(error = %e, "browser event stream error");
                }
            }
            debug!("browser event handler ended");
        });

        info!("headless browser launched");
        *guard = Some(LaunchedBrowser {
            browser,
            handler_task,
            temp_dir,
        });
        Ok(())
    }

    /// Returns a page, reusing a free one if available, bounded by
    /// `max_pages` concurrently checked-out pages at any time.
    pub async fn get_page(&self) -> Result<BrowserPage> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow!("browser pool semaphore closed"))?;

        if let Some(page) = self.free.lock().await.pop_front() {
            debug!("reusing pooled page");
            return Ok(BrowserPage {
                id: Uuid::new_v4(),
                page,
                _permit: permit,
            });
        }

        self.ensure_browser().await?;
        let browser = {
            let guard = self.browser.lock().await;
            guard
                .as_ref()
                .expect("ensure_browser just populated this")
                .browser
                .clone()
        };
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow!("failed to create page: {e}"))?;

        Ok(BrowserPage {
            id: Uuid::new_v4(),
            page,
            _permit: permit,
        })
    }

    /// Returns a page to the free list (after resetting it to
    /// `about:blank`) or disposes of it, releasing pool capacity either
    /// way.
    pub async fn close_page(&self, handle: BrowserPage, feed_into_pool: bool) {
        let BrowserPage { id, page, _permit } = handle;
        if feed_into_pool {
            if let Err(e) = page.goto("about:blank").await {
                warn!(page = %id, error = %e, "failed to reset page before pooling, disposing instead");
                let _ = page.close().await;
                return;
            }
            self.free.lock().await.push_back(page);
        } else {
            let _ = page.close().await;
        }
        // `_permit` drops here, freeing a pool slot.
    }

    /// Closes the browser and drops all pooled pages. Called on crawl
    /// controller exit.
    pub async fn shutdown(&self) -> Result<()> {
        self.free.lock().await.clear();
        if let Some(launched) = self.browser.lock().await.take() {
            launched
                .browser
                .close()
                .await
                .map_err(|e| anyhow!("failed to close browser: {e}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_bounds_pool_size() {
        let config = BrowserPoolConfig::default();
        assert_eq!(config.max_pages, 5);
    }

    #[tokio::test]
    async fn pool_starts_with_no_launched_browser() {
        let pool = BrowserPool::new(BrowserPoolConfig::default());
        assert!(pool.browser.lock().await.is_none());
        assert!(pool.free.lock().await.is_empty());
    }
}
