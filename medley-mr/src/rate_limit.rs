//! Per-source request budgets and backoff
//!
//! Sliding-window request counting plus provider-signaled exponential
//! backoff. One state record per source name, created lazily; sources with
//! no configured window are unrestricted (backoff still applies).
//!
//! The only suspension point is [`RateLimiter::wait_for_slot`]; every
//! other method takes the lock, inspects or updates state, and returns.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Upper bound on a single backoff interval
const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Debug)]
struct SourceState {
    /// `None` = unrestricted
    requests_per_window: Option<u32>,
    window_ms: u64,
    request_count: u32,
    window_start: Instant,
    backoff_until: Option<Instant>,
}

impl SourceState {
    fn unrestricted() -> Self {
        Self {
            requests_per_window: None,
            window_ms: 0,
            request_count: 0,
            window_start: Instant::now(),
            backoff_until: None,
        }
    }

    /// Lazy window roll: reset the counter once the window has elapsed
    fn roll_window(&mut self, now: Instant) {
        if self.window_ms > 0
            && now.duration_since(self.window_start) >= Duration::from_millis(self.window_ms)
        {
            self.request_count = 0;
            self.window_start = now;
        }
    }

    /// Milliseconds until the next permitted request (zero if permitted now)
    fn wait_time(&mut self, now: Instant) -> Duration {
        if let Some(until) = self.backoff_until {
            if now < until {
                return until.duration_since(now);
            }
        }

        self.roll_window(now);

        match self.requests_per_window {
            Some(limit) if self.request_count >= limit => {
                let window_end = self.window_start + Duration::from_millis(self.window_ms);
                window_end.saturating_duration_since(now)
            }
            _ => Duration::ZERO,
        }
    }
}

/// Shared, process-wide request gate for all source adapters.
///
/// Handed by reference to every adapter; tests substitute isolated
/// instances.
pub struct RateLimiter {
    states: Mutex<HashMap<String, SourceState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    /// (Re)initialize a source's window, resetting its counters
    pub async fn configure(&self, source: &str, requests_per_window: u32, window_ms: u64) {
        let mut states = self.states.lock().await;
        states.insert(
            source.to_string(),
            SourceState {
                requests_per_window: Some(requests_per_window),
                window_ms,
                request_count: 0,
                window_start: Instant::now(),
                backoff_until: None,
            },
        );
        tracing::debug!(source, requests_per_window, window_ms, "Rate limit configured");
    }

    /// Whether a request is permitted right now. No side effects beyond
    /// the lazy window roll.
    pub async fn can_request(&self, source: &str) -> bool {
        let mut states = self.states.lock().await;
        let state = states
            .entry(source.to_string())
            .or_insert_with(SourceState::unrestricted);
        state.wait_time(Instant::now()) == Duration::ZERO
    }

    /// Count one attempted request against the current window
    pub async fn record_request(&self, source: &str) {
        let mut states = self.states.lock().await;
        let state = states
            .entry(source.to_string())
            .or_insert_with(SourceState::unrestricted);
        state.roll_window(Instant::now());
        state.request_count += 1;
    }

    /// Enter exponential backoff after a provider throttling signal.
    ///
    /// `backoff_until` only ever moves forward. Returns the backoff
    /// duration: `min(2^attempt * 1000ms, 60s)`.
    pub async fn trigger_backoff(&self, source: &str, attempt: u32) -> Duration {
        let backoff = backoff_duration(attempt);
        let until = Instant::now() + backoff;

        let mut states = self.states.lock().await;
        let state = states
            .entry(source.to_string())
            .or_insert_with(SourceState::unrestricted);
        if state.backoff_until.map_or(true, |existing| until > existing) {
            state.backoff_until = Some(until);
        }

        tracing::warn!(source, attempt, backoff_ms = backoff.as_millis() as u64, "Backoff triggered");
        backoff
    }

    /// Suspend until a request slot is available.
    ///
    /// Does not block other callers; the lock is released across each
    /// sleep. Window counters reset via the lazy roll once the window
    /// elapses.
    pub async fn wait_for_slot(&self, source: &str) {
        loop {
            let wait = self.get_wait_time(source).await;
            if wait == Duration::ZERO {
                return;
            }
            tracing::debug!(source, wait_ms = wait.as_millis() as u64, "Waiting for request slot");
            tokio::time::sleep(wait).await;
        }
    }

    /// Non-suspending query of time until the next permitted request
    pub async fn get_wait_time(&self, source: &str) -> Duration {
        let mut states = self.states.lock().await;
        let state = states
            .entry(source.to_string())
            .or_insert_with(SourceState::unrestricted);
        state.wait_time(Instant::now())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// `min(2^attempt * 1000ms, 60000ms)`
fn backoff_duration(attempt: u32) -> Duration {
    let ms = match attempt {
        0..=5 => (1u64 << attempt) * 1000,
        _ => MAX_BACKOFF_MS,
    };
    Duration::from_millis(ms.min(MAX_BACKOFF_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[test]
    fn backoff_formula_is_exact() {
        assert_eq!(backoff_duration(0), Duration::from_millis(1000));
        assert_eq!(backoff_duration(1), Duration::from_millis(2000));
        assert_eq!(backoff_duration(3), Duration::from_millis(8000));
        assert_eq!(backoff_duration(5), Duration::from_millis(32000));
        assert_eq!(backoff_duration(6), Duration::from_millis(60000));
        assert_eq!(backoff_duration(10), Duration::from_millis(60000));
    }

    #[tokio::test]
    async fn unconfigured_source_is_unrestricted() {
        let limiter = RateLimiter::new();
        for _ in 0..100 {
            limiter.record_request("anything").await;
        }
        assert!(limiter.can_request("anything").await);
        assert_eq!(limiter.get_wait_time("anything").await, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn window_exhaustion_blocks_requests() {
        let limiter = RateLimiter::new();
        limiter.configure("tmdb", 3, 10_000).await;

        for _ in 0..3 {
            assert!(limiter.can_request("tmdb").await);
            limiter.record_request("tmdb").await;
        }
        assert!(!limiter.can_request("tmdb").await);
        assert!(limiter.get_wait_time("tmdb").await > Duration::ZERO);

        // Window rolls over lazily
        advance(Duration::from_millis(10_000)).await;
        assert!(limiter.can_request("tmdb").await);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_blocks_until_duration_elapses() {
        let limiter = RateLimiter::new();
        limiter.configure("goodreads", 100, 60_000).await;

        let backoff = limiter.trigger_backoff("goodreads", 1).await;
        assert_eq!(backoff, Duration::from_millis(2000));
        assert!(!limiter.can_request("goodreads").await);

        advance(Duration::from_millis(1999)).await;
        assert!(!limiter.can_request("goodreads").await);

        advance(Duration::from_millis(1)).await;
        assert!(limiter.can_request("goodreads").await);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_only_moves_forward() {
        let limiter = RateLimiter::new();
        limiter.trigger_backoff("open_library", 4).await; // 16s
        limiter.trigger_backoff("open_library", 1).await; // 2s, must not shorten

        advance(Duration::from_millis(2001)).await;
        assert!(!limiter.can_request("open_library").await);

        advance(Duration::from_millis(14_000)).await;
        assert!(limiter.can_request("open_library").await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_slot_suspends_until_window_rolls() {
        let limiter = RateLimiter::new();
        limiter.configure("google_books", 2, 5_000).await;

        limiter.record_request("google_books").await;
        limiter.record_request("google_books").await;
        assert!(!limiter.can_request("google_books").await);

        // Paused clock auto-advances through the sleep
        limiter.wait_for_slot("google_books").await;
        assert!(limiter.can_request("google_books").await);
    }

    #[tokio::test(start_paused = true)]
    async fn configure_resets_counters() {
        let limiter = RateLimiter::new();
        limiter.configure("tmdb", 1, 60_000).await;
        limiter.record_request("tmdb").await;
        assert!(!limiter.can_request("tmdb").await);

        limiter.configure("tmdb", 1, 60_000).await;
        assert!(limiter.can_request("tmdb").await);
    }
}
