//! Workspace-wide error type.
//!
//! One variant per failure class from the error handling taxonomy:
//! configuration errors are fatal at startup, everything else is local
//! and recoverable by the component that hit it.

use thiserror::Error;

/// Result type alias using [`CrawlError`].
pub type Result<T> = std::result::Result<T, CrawlError>;

#[derive(Error, Debug)]
pub enum CrawlError {
    /// Bad element spec, unknown name in `data_order`, missing seeds,
    /// invalid CSV orientation. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Timeout, connection refused, TLS failure, proxy unreachable.
    #[error("network error: {0}")]
    Network(String),

    /// Non-200 response. Handled identically to `Network` for retry
    /// purposes but kept distinct for logging.
    #[error("bad response: status {status} for {url}")]
    BadResponse { url: String, status: u16 },

    /// Timeout waiting for a readiness state or page event during a
    /// rendered fetch. Non-fatal: the caller falls back to whatever
    /// content is on the page.
    #[error("render error: {0}")]
    Render(String),

    /// Failure to parse a page's HTML. The page is skipped.
    #[error("parse error: {0}")]
    Parse(String),

    /// An event bus listener raised while handling an event.
    #[error("listener error in '{listener}': {source}")]
    Listener {
        listener: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Custom(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CrawlError {
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        CrawlError::Custom(msg.into())
    }

    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        CrawlError::Configuration(msg.into())
    }

    /// Whether a caller may reasonably retry the operation that produced
    /// this error. Configuration and parse errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CrawlError::Network(_) | CrawlError::BadResponse { .. } | CrawlError::Render(_)
        )
    }

    /// Whether the error should halt the whole crawl rather than just
    /// drop the URL that triggered it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CrawlError::Configuration(_))
    }
}
