use crate::app::ports::{HttpClientPort, HttpGetResult};
use crate::constants::page_url;
use crate::error::FetchError;
use crate::pipeline::ingestion::rate_limiter::RateLimiter;
use crate::pipeline::ingestion::retry::RetryPolicy;
use crate::types::{PageIndex, RawPage};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Issues one GET per page, with timeout, retry and optional rate limiting.
#[derive(Clone)]
pub struct Fetcher {
    client: Arc<dyn HttpClientPort>,
    base_url: String,
    table: u32,
    timeout: Duration,
    retry: RetryPolicy,
    rate_limiter: Option<RateLimiter>,
}

impl Fetcher {
    pub fn new(
        client: Arc<dyn HttpClientPort>,
        base_url: impl Into<String>,
        table: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            table,
            timeout,
            retry: RetryPolicy::default(),
            rate_limiter: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    pub fn url_for(&self, page: PageIndex) -> String {
        page_url(&self.base_url, self.table, page.0)
    }

    #[instrument(skip(self, cancel))]
    pub async fn fetch(
        &self,
        page: PageIndex,
        cancel: &CancellationToken,
    ) -> Result<RawPage, FetchError> {
        let url = self.url_for(page);
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(&url, cancel).await {
                Ok(raw) => {
                    counter!("hiscores_pages_fetched_total").increment(1);
                    return Ok(raw);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(
                        "Fetch attempt {}/{} for page {} failed: {}; retrying in {:?}",
                        attempt, max_attempts, page, e, delay
                    );
                    counter!("hiscores_fetch_retries_total").increment(1);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<RawPage, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if let Some(limiter) = &self.rate_limiter {
            tokio::select! {
                _ = limiter.acquire() => {}
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            }
        }

        let t0 = Instant::now();
        let response = tokio::select! {
            result = tokio::time::timeout(self.timeout, self.client.get(url)) => result,
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        };
        histogram!("hiscores_fetch_duration_seconds").record(t0.elapsed().as_secs_f64());

        let HttpGetResult { status, bytes } = match response {
            Err(_elapsed) => return Err(FetchError::Timeout(self.timeout.as_millis() as u64)),
            Ok(result) => result?,
        };
        if !(200..=299).contains(&status) {
            return Err(FetchError::StatusCode(status));
        }
        debug!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(RawPage(bytes))
    }
}
