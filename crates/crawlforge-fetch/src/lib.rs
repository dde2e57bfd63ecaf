//! Static and rendered URL fetching: two independent concurrency
//! gates, proxy rotation on the static path, readiness-gated waiting
//! on the rendered path, and a batch loader that retries failures
//! until each URL is resolved or its retry budget is exhausted.

pub mod engine;
pub mod retry;

pub use engine::{FetchEngine, FetchEngineConfig, FetchResponse};
pub use retry::RetryState;
