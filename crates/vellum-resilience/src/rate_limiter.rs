//! Sliding-window rate limiting for the embedding client
//!
//! Deliberately not a token bucket: a token bucket amortizes its rate over
//! time, while this tracks exact window membership via a timestamped log,
//! evicted lazily. The window boundary this produces is exact rather than
//! approximated, which matters when a caller needs to reason about "how many
//! requests landed in the last 60 seconds" precisely.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A single tracked quantity (requests, or approximate tokens) bounded to a
/// maximum sum within a trailing time window.
struct SlidingWindowLog {
    window: Duration,
    limit: usize,
    entries: VecDeque<(Instant, usize)>,
    sum: usize,
}

impl SlidingWindowLog {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            window,
            limit,
            entries: VecDeque::new(),
            sum: 0,
        }
    }

    /// Drop entries older than the window, in order (they're pushed in
    /// order, so the front is always the oldest).
    fn evict_expired(&mut self, now: Instant) {
        while let Some(&(recorded_at, amount)) = self.entries.front() {
            if now.duration_since(recorded_at) >= self.window {
                self.entries.pop_front();
                self.sum = self.sum.saturating_sub(amount);
            } else {
                break;
            }
        }
    }

    /// How long until the oldest entry ages out, if the log is at capacity.
    fn time_until_room(&self, now: Instant) -> Option<Duration> {
        self.entries.front().map(|&(recorded_at, _)| {
            self.window.saturating_sub(now.duration_since(recorded_at))
        })
    }

    fn record(&mut self, now: Instant, amount: usize) {
        self.entries.push_back((now, amount));
        self.sum += amount;
    }
}

/// Blocks callers so that neither the request count nor the approximate
/// token count exceeds its configured per-minute ceiling, tracked via two
/// independent sliding-window logs.
pub struct RateLimiter {
    requests: Mutex<SlidingWindowLog>,
    tokens: Mutex<SlidingWindowLog>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(requests_per_minute: usize, tokens_per_minute: usize) -> Self {
        let window = Duration::from_secs(60);
        Self {
            requests: Mutex::new(SlidingWindowLog::new(requests_per_minute, window)),
            tokens: Mutex::new(SlidingWindowLog::new(tokens_per_minute, window)),
        }
    }

    /// Wait until a single request carrying `estimated_tokens` can be
    /// admitted under both trackers, then record it.
    pub async fn acquire(&self, estimated_tokens: usize) {
        Self::acquire_one(&self.requests, 1).await;
        Self::acquire_one(&self.tokens, estimated_tokens).await;
    }

    async fn acquire_one(log: &Mutex<SlidingWindowLog>, amount: usize) {
        loop {
            let wait = {
                let mut log = log.lock().await;
                let now = Instant::now();
                log.evict_expired(now);
                if log.sum + amount <= log.limit {
                    log.record(now, amount);
                    return;
                }
                log.time_until_room(now)
            };
            match wait {
                Some(duration) if duration > Duration::ZERO => tokio::time::sleep(duration).await,
                _ => tokio::task::yield_now().await,
            }
        }
    }
}

/// Approximate token count for rate-limiting purposes: `len(text) / 4`,
/// per the embedding client's token-ceiling contract.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_calls_within_the_limit_without_blocking() {
        let limiter = RateLimiter::new(10, 10_000);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire(100).await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn blocks_until_the_oldest_request_ages_out() {
        let limiter = RateLimiter::new(1, 10_000);
        limiter.acquire(10).await;

        let blocked = tokio::spawn(async move {
            limiter.acquire(10).await;
        });

        tokio::time::advance(Duration::from_secs(61)).await;
        tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("second acquire should complete once the window rolls over")
            .expect("task should not panic");
    }

    #[test]
    fn estimate_tokens_divides_length_by_four() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }
}
