//! Sliding-window rate limiter for outbound API calls
//!
//! Enforces a maximum number of operations within a rolling time window by
//! suspending the caller until a slot opens, rather than rejecting the call.
//! The window trails "now" and is recomputed on every admission check; it is
//! not aligned to wall-clock boundaries. A single limiter only governs one
//! process's call volume; there is no cross-process coordination.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Extra sleep on top of the computed wait so the oldest timestamp has
/// actually left the window when we re-check.
const WAIT_MARGIN: Duration = Duration::from_millis(100);

/// Admission control over a rolling time window
///
/// Tracks the admission time of recent calls; a new call is admitted once
/// fewer than `max_requests` admissions remain inside the trailing window.
#[derive(Debug)]
pub struct RateLimiter {
    /// Maximum admissions inside the window
    max_requests: usize,
    /// Sliding window duration
    window: Duration,
    /// Admission timestamps, oldest first
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter admitting at most `max_requests` per `window`
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Runs `f` once a request slot is available
    ///
    /// The slot is consumed before `f` runs, so a failing `f` still counts
    /// against the quota (matching provider-side accounting, which bills the
    /// request regardless of outcome). `f`'s output is returned unchanged;
    /// the limiter never retries.
    pub async fn execute<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire().await;
        f().await
    }

    /// Waits until a slot is free, then records the admission
    async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock().await;
                let now = Instant::now();

                // Drop admissions that have left the window
                while timestamps
                    .front()
                    .is_some_and(|&t| now.duration_since(t) >= self.window)
                {
                    timestamps.pop_front();
                }

                if timestamps.len() < self.max_requests {
                    timestamps.push_back(now);
                    return;
                }

                match timestamps.front() {
                    Some(&oldest) => self.window.saturating_sub(now.duration_since(oldest)),
                    None => {
                        // max_requests of zero; admit rather than spin forever
                        timestamps.push_back(now);
                        return;
                    }
                }
            };

            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            sleep(wait + WAIT_MARGIN).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: usize, window_ms: u64) -> RateLimiter {
        RateLimiter::new(max_requests, Duration::from_millis(window_ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_limit_immediately() {
        let limiter = limiter(3, 1000);
        let start = Instant::now();

        for i in 0..3 {
            let result = limiter.execute(|| async move { i }).await;
            assert_eq!(result, i);
        }

        assert!(
            start.elapsed() < Duration::from_millis(10),
            "Calls within the budget should not wait"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_over_limit_waits_out_the_window() {
        let limiter = limiter(3, 1000);
        let start = Instant::now();

        for _ in 0..5 {
            limiter.execute(|| async {}).await;
        }

        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(1000),
            "Calls 4 and 5 should be delayed until the window opens, elapsed {:?}",
            elapsed
        );
        assert!(
            elapsed < Duration::from_millis(2500),
            "Calls 4 and 5 should both fit in the next window, elapsed {:?}",
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides_rather_than_resetting() {
        let limiter = limiter(2, 1000);

        limiter.execute(|| async {}).await;
        sleep(Duration::from_millis(600)).await;
        limiter.execute(|| async {}).await;

        // Third call at t=600 must wait until the first admission (t=0)
        // leaves the window, i.e. roughly 400ms more, not a full second.
        let start = Instant::now();
        limiter.execute(|| async {}).await;
        let waited = start.elapsed();

        assert!(waited >= Duration::from_millis(400), "waited {:?}", waited);
        assert!(waited < Duration::from_millis(1000), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_call_still_consumes_a_slot() {
        let limiter = limiter(1, 1000);

        let result: Result<(), &str> = limiter.execute(|| async { Err("boom") }).await;
        assert!(result.is_err());

        // The failed call must count against the quota, so this one waits.
        let start = Instant::now();
        limiter.execute(|| async {}).await;
        assert!(
            start.elapsed() >= Duration::from_millis(900),
            "Second call should wait out the window after a failure"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_passes_through_unchanged() {
        let limiter = limiter(5, 1000);

        let ok: Result<i32, String> = limiter.execute(|| async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<i32, String> =
            limiter.execute(|| async { Err("remote error".to_string()) }).await;
        assert_eq!(err, Err("remote error".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_does_not_deadlock() {
        let limiter = limiter(0, 1000);
        limiter.execute(|| async {}).await;
    }
}
