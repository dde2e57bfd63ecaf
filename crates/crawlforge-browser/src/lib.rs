//! Pool of reusable headless-browser render contexts ("pages") used by
//! the fetch engine's rendered path.

pub mod pool;

pub use pool::{BrowserPage, BrowserPool, BrowserPoolConfig};
