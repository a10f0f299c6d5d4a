use crate::types::{PageIndex, PageRecord, Record};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use uuid::Uuid;

/// Shared collection that page pipelines append into while a run is in flight.
///
/// Appends are serialized by a mutex; a single append keeps its records
/// contiguous and in order. There is no ordering across pages.
#[derive(Debug, Default)]
pub struct Highscores {
    entries: Mutex<Vec<PageRecord>>,
}

impl Highscores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one page's records. Returns the number appended.
    pub fn append(&self, page: PageIndex, records: Vec<Record>) -> usize {
        let count = records.len();
        if count == 0 {
            return 0;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.extend(records.into_iter().map(|record| PageRecord { page, record }));
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seal the collection. Taking `self` by value means no append can follow.
    pub fn finish(self, run_id: Uuid, table: u32) -> FinishedHighscores {
        FinishedHighscores {
            run_id,
            table,
            finished_at: Utc::now(),
            entries: self.entries.into_inner().unwrap_or_else(|e| e.into_inner()),
        }
    }
}

/// Read-only aggregate of a completed run, handed to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedHighscores {
    pub run_id: Uuid,
    pub table: u32,
    pub finished_at: DateTime<Utc>,
    entries: Vec<PageRecord>,
}

impl FinishedHighscores {
    pub fn entries(&self) -> &[PageRecord] {
        &self.entries
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by rank, then page, independent of completion order.
    pub fn sorted_by_rank(&self) -> Vec<PageRecord> {
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| {
            a.record
                .rank
                .cmp(&b.record.rank)
                .then(a.page.cmp(&b.page))
        });
        sorted
    }
}
