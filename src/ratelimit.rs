/// RPC Rate Limiter - token bucket
///
/// Every provider call takes one token. The bucket holds up to `burst`
/// tokens and refills at `requests_per_second`. Callers that find the
/// bucket empty sleep until the next token is due.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitPolicy {
    pub requests_per_second: f64,
    pub burst: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst: 5,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    policy: Option<RateLimitPolicy>,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        let burst = policy.burst.max(1) as f64;
        let policy = RateLimitPolicy {
            requests_per_second: policy.requests_per_second,
            burst: policy.burst.max(1),
        };
        // A non-positive rate means "no limit"
        let policy = (policy.requests_per_second > 0.0).then_some(policy);
        Self {
            policy,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            policy: None,
            bucket: Mutex::new(Bucket {
                tokens: 0.0,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn policy(&self) -> Option<RateLimitPolicy> {
        self.policy
    }

    /// Wait until a token is available and take it
    pub async fn acquire(&self) {
        let Some(policy) = self.policy else {
            return;
        };

        let started = Instant::now();
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * policy.requests_per_second)
                    .min(policy.burst as f64);
                bucket.last_refill = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    None
                } else {
                    let missing = 1.0 - bucket.tokens;
                    Some(Duration::from_secs_f64(missing / policy.requests_per_second))
                }
            };

            match wait {
                None => break,
                Some(wait) => sleep(wait).await,
            }
        }

        let waited = started.elapsed();
        if !waited.is_zero() {
            metrics::record_rate_limit_wait(waited.as_secs_f64());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_immediate() {
        let limiter = RateLimiter::new(RateLimitPolicy {
            requests_per_second: 1.0,
            burst: 3,
        });

        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paces_after_burst() {
        let limiter = RateLimiter::new(RateLimitPolicy {
            requests_per_second: 2.0,
            burst: 1,
        });

        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        // 1 immediate + 4 more at 500ms each
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1999), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(2100), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..1000 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(limiter.policy().is_none());
    }

    #[test]
    fn test_zero_rate_disables_limit() {
        let limiter = RateLimiter::new(RateLimitPolicy {
            requests_per_second: 0.0,
            burst: 0,
        });
        assert!(limiter.policy().is_none());
    }
}
