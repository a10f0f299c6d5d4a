use crate::pipeline::RunReport;
use crate::types::PageIndex;
use thiserror::Error;

/// Failure to obtain a page body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    StatusCode(u16),

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::Timeout(_) => true,
            FetchError::StatusCode(status) => *status == 429 || (500..=599).contains(status),
            FetchError::Cancelled => false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no <tbody> region found in page")]
    NoTableBody,
}

/// Page-level (`Malformed`) and row-level (`ShortRow`, `FieldParse`) parse failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed table markup: {0}")]
    Malformed(String),

    #[error("row {row} has {cells} cells, expected 4")]
    ShortRow { row: usize, cells: usize },

    #[error("row {row}: cannot parse {field} from {value:?}")]
    FieldParse {
        row: usize,
        field: &'static str,
        value: String,
    },
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sink rejected batch: {0}")]
    Rejected(String),
}

/// Why a single page contributed no records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("page {page}: {source}")]
    Fetch {
        page: PageIndex,
        #[source]
        source: FetchError,
    },

    #[error("page {page}: {source}")]
    Extract {
        page: PageIndex,
        #[source]
        source: ExtractError,
    },

    #[error("page {page}: {source}")]
    Parse {
        page: PageIndex,
        #[source]
        source: ParseError,
    },

    #[error("page {page}: task aborted: {message}")]
    Aborted { page: PageIndex, message: String },
}

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP client setup failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The run completed but its aggregate was not delivered; `report` still
    /// carries the page counts.
    #[error("Sink failed: {source}")]
    Sink {
        #[source]
        source: SinkError,
        report: Box<RunReport>,
    },

    #[error("Invalid coordinator state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, ScraperError>;
