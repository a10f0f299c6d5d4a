pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod infra;
pub mod logging;
pub mod pipeline;
pub mod types;

pub use config::ScrapeConfig;
pub use error::{ExtractError, FetchError, PageError, ParseError, Result, ScraperError, SinkError};
pub use pipeline::{Coordinator, FinishedHighscores, RunReport, RunState};
pub use types::{PageIndex, RawPage, Record};
