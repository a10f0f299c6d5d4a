use crate::app::ports::HighscoreSink;
use crate::error::SinkError;
use crate::pipeline::aggregator::FinishedHighscores;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes each finished batch to a timestamped, pretty-printed JSON file.
pub struct JsonFileSink {
    output_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn file_name_for(batch: &FinishedHighscores) -> String {
        let timestamp = batch.finished_at.format("%Y%m%d_%H%M%S");
        let run = batch.run_id.simple().to_string();
        format!("highscores_table{}_{}_{}.json", batch.table, timestamp, &run[..8])
    }
}

#[async_trait]
impl HighscoreSink for JsonFileSink {
    async fn accept(&self, batch: &FinishedHighscores) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(Self::file_name_for(batch));
        let json = serde_json::to_vec_pretty(batch)?;
        tokio::fs::write(&path, json).await?;
        info!("Saved {} records to {}", batch.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::aggregator::Highscores;
    use crate::types::{PageIndex, Record};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_writes_batch_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let sink = JsonFileSink::new(&out);

        let hs = Highscores::new();
        hs.append(
            PageIndex(1),
            vec![Record {
                rank: 1,
                name: "Lynx Titan".into(),
                level: 2277,
                xp: 4_600_000_000,
            }],
        );
        let batch = hs.finish(Uuid::new_v4(), 0);
        sink.accept(&batch).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(&out).unwrap().map(|e| e.unwrap().path()).collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name, JsonFileSink::file_name_for(&batch));
        assert!(name.starts_with("highscores_table0_"));

        let bytes = std::fs::read(&files[0]).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["table"], 0);
        assert_eq!(json["entries"].as_array().unwrap().len(), 1);
        assert_eq!(json["entries"][0]["name"], "Lynx Titan");
        assert_eq!(json["entries"][0]["xp"], 4_600_000_000u64);
    }

    #[tokio::test]
    async fn test_unwritable_dir_is_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let sink = JsonFileSink::new(blocker.join("sub"));

        let batch = Highscores::new().finish(Uuid::new_v4(), 0);
        let err = sink.accept(&batch).await.unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
