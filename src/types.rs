use serde::{Deserialize, Serialize};
use std::fmt;

/// One page of the paginated leaderboard (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageIndex(pub u32);

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Response body of one page request, owned by the pipeline that fetched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage(pub Vec<u8>);

impl RawPage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RawPage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for RawPage {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

/// A single leaderboard entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub rank: u32,
    pub name: String,
    pub level: u32,
    pub xp: u64,
}

/// A record together with the page it was scraped from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRecord {
    pub page: PageIndex,
    #[serde(flatten)]
    pub record: Record,
}
