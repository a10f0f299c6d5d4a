pub mod fetcher;
pub mod rate_limiter;
pub mod retry;

pub use fetcher::Fetcher;
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
