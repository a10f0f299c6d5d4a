pub mod aggregator;
pub mod coordinator;
pub mod ingestion;
pub mod processing;

pub use aggregator::{FinishedHighscores, Highscores};
pub use coordinator::{Coordinator, PagePipeline, PageSummary, RunReport, RunState};
