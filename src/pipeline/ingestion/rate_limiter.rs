use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Requests-per-minute token bucket shared by every page fetch in a run.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    requests_per_min: u64,
    // tokens available and the time of the last refill
    tokens: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    pub fn new(requests_per_min: u64) -> Self {
        let capacity = requests_per_min as f64;
        Self {
            inner: Arc::new(Inner {
                requests_per_min,
                tokens: Mutex::new((capacity, Instant::now())),
            }),
        }
    }

    pub fn requests_per_min(&self) -> u64 {
        self.inner.requests_per_min
    }

    /// Wait until one request may be issued.
    pub async fn acquire(&self) {
        if self.inner.requests_per_min == 0 {
            return;
        }
        let capacity = self.inner.requests_per_min as f64;
        let refill_rate = capacity / 60.0; // tokens per second
        loop {
            let mut guard = self.inner.tokens.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *tokens = (*tokens + elapsed * refill_rate).min(capacity);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                break;
            }
            let secs = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
        }
    }
}
