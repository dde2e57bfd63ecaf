//! Per-URL retry bookkeeping for the fetch engine's batch load.
//!
//! A tagged variant instead of a bare `HashMap<Url, i32>` sentinel
//! count (per the design note this crate follows): `Fresh` never
//! failed, `Retrying(n)` has failed `n` times and is still eligible,
//! `Dropped` exhausted its budget and is logged, not retried again.

/// State of one URL's retry accounting inside a single
/// [`crate::engine::FetchEngine::load_responses`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Fresh,
    Retrying(u32),
    Dropped,
}

impl Default for RetryState {
    fn default() -> Self {
        RetryState::Fresh
    }
}

impl RetryState {
    /// Records one more failed attempt.
    pub fn record_failure(self) -> RetryState {
        match self {
            RetryState::Fresh => RetryState::Retrying(0),
            RetryState::Retrying(n) => RetryState::Retrying(n + 1),
            RetryState::Dropped => RetryState::Dropped,
        }
    }

    /// Whether this URL may still be retried under `max_retries`.
    pub fn is_eligible(self, max_retries: u32) -> bool {
        matches!(self, RetryState::Retrying(n) if n < max_retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_failures_at_max_retries_two_drops_on_third() {
        let mut state = RetryState::Fresh;
        state = state.record_failure(); // 1st failure -> Retrying(0)
        assert!(state.is_eligible(2));
        state = state.record_failure(); // 2nd failure -> Retrying(1)
        assert!(state.is_eligible(2));
        state = state.record_failure(); // 3rd failure -> Retrying(2)
        assert!(!state.is_eligible(2));
    }

    #[test]
    fn zero_max_retries_drops_immediately() {
        let state = RetryState::Fresh.record_failure();
        assert!(!state.is_eligible(0));
    }
}
