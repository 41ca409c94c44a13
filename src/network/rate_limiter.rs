// src/network/rate_limiter.rs
//! Minimum-interval rate limiter for outbound API calls
//!
//! One limiter is shared by job fetches and submissions. Acquisition is
//! serialized: the lock is held while the caller sleeps, so the "last
//! granted" instant is updated atomically with the grant.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Guarantees at least `min_interval` between successive grants
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter; a zero interval never waits
    pub fn new(min_interval: Duration) -> Self {
        RateLimiter {
            min_interval,
            last_grant: Mutex::new(None),
        }
    }

    /// Configured minimum spacing between grants
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until a call is permitted and records the grant
    ///
    /// # Returns
    /// How long the caller was held back
    pub async fn acquire(&self) -> Duration {
        let mut last = self.last_grant.lock().await;

        let waited = match *last {
            Some(prev) => {
                let ready_at = prev + self.min_interval;
                let now = Instant::now();
                if ready_at > now {
                    let wait = ready_at - now;
                    log::debug!("Rate limiter holding request for {:?}", wait);
                    tokio::time::sleep_until(ready_at).await;
                    wait
                } else {
                    Duration::ZERO
                }
            }
            None => Duration::ZERO,
        };

        *last = Some(Instant::now());
        waited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const INTERVAL: Duration = Duration::from_millis(60);
    // Allowance for timer granularity.
    const JITTER: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn first_acquisition_is_immediate() {
        let limiter = RateLimiter::new(INTERVAL);
        assert_eq!(limiter.acquire().await, Duration::ZERO);
    }

    #[tokio::test]
    async fn sequential_grants_are_spaced() {
        let limiter = RateLimiter::new(INTERVAL);
        let mut grants = Vec::new();
        for _ in 0..4 {
            limiter.acquire().await;
            grants.push(Instant::now());
        }

        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] + JITTER >= INTERVAL, "spacing {:?}", pair[1] - pair[0]);
        }
    }

    #[tokio::test]
    async fn concurrent_callers_are_serialized() {
        let limiter = Arc::new(RateLimiter::new(INTERVAL));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap());
        }
        grants.sort();

        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] + JITTER >= INTERVAL);
        }
        assert!(start.elapsed() + JITTER >= INTERVAL * 2);
    }

    #[tokio::test]
    async fn zero_interval_never_waits() {
        let limiter = RateLimiter::new(Duration::ZERO);
        for _ in 0..5 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
    }
}
