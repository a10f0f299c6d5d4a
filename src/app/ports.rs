use crate::error::{FetchError, SinkError};
use crate::pipeline::aggregator::FinishedHighscores;
use async_trait::async_trait;

/// Transport used by the fetcher. Implementations report only transport-level
/// failures; status validation happens in the fetcher.
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpGetResult, FetchError>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub bytes: Vec<u8>,
}

/// Destination for the finished aggregate of a run.
#[async_trait]
pub trait HighscoreSink: Send + Sync {
    async fn accept(&self, batch: &FinishedHighscores) -> Result<(), SinkError>;
}
