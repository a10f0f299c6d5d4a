use crate::app::ports::HighscoreSink;
use crate::error::SinkError;
use crate::pipeline::aggregator::FinishedHighscores;
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::debug;

/// Keeps accepted batches in memory, or rejects them when built with
/// [`MemorySink::rejecting`].
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Mutex<Vec<FinishedHighscores>>,
    reject_with: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            reject_with: Some(reason.into()),
        }
    }

    pub fn batches(&self) -> Vec<FinishedHighscores> {
        self.batches.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn accepted_count(&self) -> usize {
        self.batches.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl HighscoreSink for MemorySink {
    async fn accept(&self, batch: &FinishedHighscores) -> Result<(), SinkError> {
        if let Some(reason) = &self.reject_with {
            return Err(SinkError::Rejected(reason.clone()));
        }
        debug!("MemorySink accepted {} records", batch.len());
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(batch.clone());
        Ok(())
    }
}
